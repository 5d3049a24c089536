// Minter common library - main library exports

pub mod cbor;
pub mod collaborators;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod plutus_data;
pub mod protocol_params;
pub mod rational_number;
pub mod script;
pub mod types;
pub mod value;

// Flattened re-exports
pub use self::error::MintError;
pub use self::hash::*;
pub use self::plutus_data::PlutusData;
pub use self::script::*;
pub use self::types::*;
pub use self::value::*;
