use crate::prelude::*;

/// A term identifier consisting of an ID string (which is required to be unique)
/// and an address to indicate where the term is located in the analyzed program.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Tid {
    /// The unique ID of the term.
    id: String,
    /// The address where the term is located.
    pub address: String,
}

impl Tid {
    /// Generate a new term identifier with the given ID string
    /// and with unknown address.
    pub fn new<T: ToString>(val: T) -> Tid {
        Tid {
            id: val.to_string(),
            address: "UNKNOWN".to_string(),
        }
    }

    /// Generate a new term identifier with the given ID string and address.
    pub fn new_at<T: ToString>(val: T, address: &str) -> Tid {
        Tid {
            id: val.to_string(),
            address: address.to_string(),
        }
    }
}

impl std::fmt::Display for Tid {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.id)
    }
}

/// A term is an object inside the analyzed program with an address
/// and a unique ID (both contained in the `tid`).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Term<T> {
    /// The term identifier, which also contains the address of the term.
    pub tid: Tid,
    /// The object.
    pub term: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tid_display_shows_only_the_id() {
        let tid = Tid::new_at("instr_1", "0x104c");
        assert_eq!(format!("{tid}"), "instr_1");
        assert_eq!(tid.address, "0x104c");
        assert_eq!(Tid::new("foo").address, "UNKNOWN");
    }
}
