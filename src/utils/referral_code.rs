use crate::error::AppResult;
use rand::Rng;
use sqlx::PgPool;

const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_CHARS[rng.gen_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Generate a referral code not yet present in the users table.
pub async fn generate_unique_referral_code(pool: &PgPool) -> AppResult<String> {
    loop {
        let code = random_code();

        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE referral_code = $1")
                .bind(&code)
                .fetch_one(pool)
                .await?;

        if exists == 0 {
            return Ok(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_code_shape() {
        let code = random_code();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
    }

    #[test]
    fn test_no_ambiguous_characters() {
        // 0/O and 1/I are excluded so codes can be dictated over the phone.
        for _ in 0..100 {
            let code = random_code();
            assert!(!code.contains('0'));
            assert!(!code.contains('O'));
            assert!(!code.contains('1'));
            assert!(!code.contains('I'));
        }
    }
}
