use rand::{distributions::Alphanumeric, Rng};

/// Number of digits in an email verification code.
pub const OTP_LENGTH: usize = 6;

/// Random 6-digit code in `100000..=999999` (never has a leading zero).
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// Random alphanumeric string, used as throwaway password for OAuth accounts.
pub fn random_secret(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
