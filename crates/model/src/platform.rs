use crate::error::{Error, ErrorKind};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A stock agency whose CSV upload layout can be produced.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[display("AdobeStock")]
    AdobeStock,
    #[display("Shutterstock")]
    Shutterstock,
}
impl FromStr for Platform {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sanitized = s.trim().to_lowercase().replace(['-', '_', ' '], "");
        match sanitized.as_str() {
            "adobe" | "adobestock" => Ok(Self::AdobeStock),
            "shutterstock" | "shutter" => Ok(Self::Shutterstock),
            _ => exn::bail!(ErrorKind::Unrecognized(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("adobe", Platform::AdobeStock)]
    #[case("Adobe Stock", Platform::AdobeStock)]
    #[case("adobe_stock", Platform::AdobeStock)]
    #[case("shutterstock", Platform::Shutterstock)]
    #[case("Shutter-Stock", Platform::Shutterstock)]
    fn test_parse(#[case] input: &str, #[case] expected: Platform) {
        assert_eq!(input.parse::<Platform>().unwrap(), expected);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("getty".parse::<Platform>().is_err());
    }

    #[test]
    fn test_display_is_file_name_component() {
        assert_eq!(Platform::AdobeStock.to_string(), "AdobeStock");
        assert_eq!(Platform::Shutterstock.to_string(), "Shutterstock");
    }
}
