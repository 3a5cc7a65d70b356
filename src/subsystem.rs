//! Subsystem types and the web-server family hosting them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One PKI role deployable inside an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubsystemType {
    Ca,
    Kra,
    Ocsp,
    Tks,
    Tps,
    Ra,
}

/// Process family an instance runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebServerFamily {
    Apache,
    Tomcat,
}

impl SubsystemType {
    pub const ALL: [SubsystemType; 6] = [
        SubsystemType::Ca,
        SubsystemType::Kra,
        SubsystemType::Ocsp,
        SubsystemType::Tks,
        SubsystemType::Tps,
        SubsystemType::Ra,
    ];

    /// Upper-case name, also the configuration section name (`CA`)
    pub fn as_str(&self) -> &'static str {
        match self {
            SubsystemType::Ca => "CA",
            SubsystemType::Kra => "KRA",
            SubsystemType::Ocsp => "OCSP",
            SubsystemType::Tks => "TKS",
            SubsystemType::Tps => "TPS",
            SubsystemType::Ra => "RA",
        }
    }

    /// Lower-case name used for directories and URLs (`ca`)
    pub fn dir_name(&self) -> &'static str {
        match self {
            SubsystemType::Ca => "ca",
            SubsystemType::Kra => "kra",
            SubsystemType::Ocsp => "ocsp",
            SubsystemType::Tks => "tks",
            SubsystemType::Tps => "tps",
            SubsystemType::Ra => "ra",
        }
    }

    pub fn family(&self) -> WebServerFamily {
        match self {
            SubsystemType::Ra | SubsystemType::Tps => WebServerFamily::Apache,
            _ => WebServerFamily::Tomcat,
        }
    }

    /// Java subsystems keep a signed audit trail
    pub fn has_signed_audit(&self) -> bool {
        self.family() == WebServerFamily::Tomcat
    }
}

impl fmt::Display for SubsystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubsystemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubsystemType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown subsystem '{s}' (expected one of: {})",
                    SubsystemType::ALL.map(|t| t.as_str()).join(", ")
                )
            })
    }
}

impl WebServerFamily {
    /// Configuration section name (`Tomcat`)
    pub fn section(&self) -> &'static str {
        match self {
            WebServerFamily::Apache => "Apache",
            WebServerFamily::Tomcat => "Tomcat",
        }
    }

    /// Lower-case name used in registry paths (`tomcat`)
    pub fn dir_name(&self) -> &'static str {
        match self {
            WebServerFamily::Apache => "apache",
            WebServerFamily::Tomcat => "tomcat",
        }
    }

    pub fn members(&self) -> Vec<SubsystemType> {
        SubsystemType::ALL
            .into_iter()
            .filter(|t| t.family() == *self)
            .collect()
    }
}

impl fmt::Display for WebServerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("ca".parse::<SubsystemType>().unwrap(), SubsystemType::Ca);
        assert_eq!("Kra".parse::<SubsystemType>().unwrap(), SubsystemType::Kra);
        assert!("xyz".parse::<SubsystemType>().unwrap_err().contains("CA, KRA"));
    }

    #[test]
    fn test_family_partition() {
        assert_eq!(
            WebServerFamily::Apache.members(),
            [SubsystemType::Tps, SubsystemType::Ra]
        );
        assert_eq!(WebServerFamily::Tomcat.members().len(), 4);
        assert!(SubsystemType::Ocsp.has_signed_audit());
        assert!(!SubsystemType::Ra.has_signed_audit());
    }

    #[test]
    fn test_names() {
        assert_eq!(SubsystemType::Tks.as_str(), "TKS");
        assert_eq!(SubsystemType::Tks.dir_name(), "tks");
        assert_eq!(WebServerFamily::Tomcat.dir_name(), "tomcat");
        assert_eq!(WebServerFamily::Apache.to_string(), "Apache");
    }
}
