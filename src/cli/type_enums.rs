use std::fmt;
use std::str::FromStr;

/// A `--set name=value` choice preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceAssignment {
    pub name: String,
    pub value: String,
}

/// Parses `name=value`. The value may itself contain `=`; the name may not be empty.
impl FromStr for ChoiceAssignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => Ok(ChoiceAssignment {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(format!("Invalid choice '{s}'. Expected NAME=VALUE, e.g. node_version=20")),
        }
    }
}

impl fmt::Display for ChoiceAssignment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}
