use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Register/login request body.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// Point balance for one user: spendable points and the lifetime total
/// withdrawn. Both are NUMERIC(15,2) in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn balance_serializes_as_numbers() {
        let balance = Balance {
            current: dec!(42.50),
            withdrawn: dec!(20),
        };
        let json = serde_json::to_value(balance).unwrap();
        assert_eq!(json, serde_json::json!({"current": 42.5, "withdrawn": 20.0}));
    }

    #[test]
    fn credentials_deserialize() {
        let creds: Credentials =
            serde_json::from_str(r#"{"login":"alice","password":"pw"}"#).unwrap();
        assert_eq!(creds.login, "alice");
        assert_eq!(creds.password, "pw");
    }
}
