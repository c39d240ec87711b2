//! Contract ABI descriptors
//!
//! The JSON shape follows the familiar solc interface format: an array of
//! entries tagged by `"type"`.
//!
//! ```json
//! [{"type":"function","name":"f","inputs":[],"outputs":[{"name":"","type":"uint256"}],"constant":false}]
//! ```

use crate::crypto::hash::sha256;
use serde::{Deserialize, Serialize};

/// A parameter of a function or event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Only meaningful for event parameters
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub indexed: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            indexed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionAbi {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Param>,
    #[serde(default)]
    pub outputs: Vec<Param>,
    /// Read-only functions are served by a call rather than a transaction
    #[serde(default)]
    pub constant: bool,
}

impl FunctionAbi {
    /// Canonical signature, e.g. `add(uint256,uint256)`
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|p| p.kind.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    pub fn selector(&self) -> u64 {
        selector(&self.signature())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAbi {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Param>,
    #[serde(default)]
    pub anonymous: bool,
}

/// One ABI entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AbiEntry {
    Function(FunctionAbi),
    Event(EventAbi),
}

/// A contract interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Abi {
    entries: Vec<AbiEntry>,
}

impl Abi {
    pub fn new(entries: Vec<AbiEntry>) -> Self {
        Self { entries }
    }

    /// Parse the JSON interface string emitted by the compiler
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn entries(&self) -> &[AbiEntry] {
        &self.entries
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionAbi> {
        self.entries.iter().filter_map(|entry| match entry {
            AbiEntry::Function(function) => Some(function),
            AbiEntry::Event(_) => None,
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &EventAbi> {
        self.entries.iter().filter_map(|entry| match entry {
            AbiEntry::Event(event) => Some(event),
            AbiEntry::Function(_) => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&FunctionAbi> {
        self.functions().find(|function| function.name == name)
    }
}

/// First four bytes of SHA-256 over the canonical signature
pub fn selector(signature: &str) -> u64 {
    let digest = sha256(signature.as_bytes());
    u64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER_ABI: &str = r#"[
        {"type":"function","name":"add","inputs":[{"name":"a","type":"uint256"},{"name":"b","type":"uint256"}],"outputs":[{"name":"","type":"uint256"}],"constant":true},
        {"type":"function","name":"reset","inputs":[],"outputs":[]},
        {"type":"event","name":"Reset","inputs":[{"name":"by","type":"uint256","indexed":true}],"anonymous":false}
    ]"#;

    #[test]
    fn test_parse_interface() {
        let abi = Abi::from_json(COUNTER_ABI).unwrap();

        assert_eq!(abi.entries().len(), 3);
        let add = abi.function("add").unwrap();
        assert!(add.constant);
        assert_eq!(add.signature(), "add(uint256,uint256)");
        assert!(!abi.function("reset").unwrap().constant);

        let event = abi.events().next().unwrap();
        assert_eq!(event.name, "Reset");
        assert!(event.inputs[0].indexed);
    }

    #[test]
    fn test_serialized_shape() {
        let abi = Abi::new(vec![AbiEntry::Function(FunctionAbi {
            name: "f".to_string(),
            inputs: vec![],
            outputs: vec![Param::new("", "uint256")],
            constant: false,
        })]);

        let value: serde_json::Value = serde_json::from_str(&abi.to_json().unwrap()).unwrap();
        assert_eq!(value[0]["type"], "function");
        assert_eq!(value[0]["outputs"][0]["type"], "uint256");
        assert!(value[0]["outputs"][0].get("indexed").is_none());
    }

    #[test]
    fn test_malformed_interface() {
        assert!(Abi::from_json("{not json").is_err());
        assert!(Abi::from_json(r#"[{"type":"banana"}]"#).is_err());
    }

    #[test]
    fn test_selector_is_four_bytes_and_distinct() {
        let a = selector("f()");
        let b = selector("g()");
        assert!(a <= u64::from(u32::MAX));
        assert_ne!(a, b);
    }
}
