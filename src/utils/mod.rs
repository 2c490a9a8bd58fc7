pub mod csv;
pub mod jwt;
pub mod password;
pub mod referral_code;
pub mod similarity;

pub use csv::csv_escape;
pub use jwt::{Claims, JwtService};
pub use password::{hash_password, validate_password, verify_password};
pub use referral_code::generate_unique_referral_code;
pub use similarity::{levenshtein, similarity};
