mod address;
mod certs;
mod script_data;
mod tx;
mod utxo;
mod witness;

pub use address::*;
pub use certs::*;
pub use script_data::*;
pub use tx::*;
pub use utxo::*;
pub use witness::*;
