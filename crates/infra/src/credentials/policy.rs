use chrono::Duration;

/// Consecutive failed sign-ins before an account is locked, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub lockout: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout: Duration::minutes(5),
        }
    }
}

/// Password strength rules applied when an account is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_len: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_len: 6,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: true,
        }
    }
}

impl PasswordPolicy {
    /// Returns every rule the password breaks, joined into one message.
    pub fn check(&self, password: &str) -> Result<(), String> {
        let mut problems = Vec::new();
        if password.chars().count() < self.min_len {
            problems.push(format!("must be at least {} characters", self.min_len));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            problems.push("must contain a digit".to_string());
        }
        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            problems.push("must contain a lowercase letter".to_string());
        }
        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            problems.push("must contain an uppercase letter".to_string());
        }
        if self.require_non_alphanumeric && password.chars().all(char::is_alphanumeric) {
            problems.push("must contain a non-alphanumeric character".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(format!("password {}", problems.join(", ")))
        }
    }
}
