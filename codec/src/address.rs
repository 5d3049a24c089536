use anyhow::{Result, anyhow};
use minter_common::{AddrKeyhash, NetworkId};
use pallas::ledger::addresses as pallas_addresses;

/// Map Pallas Network to our NetworkId
pub fn map_network(network: pallas_addresses::Network) -> Result<NetworkId> {
    match network {
        pallas_addresses::Network::Mainnet => Ok(NetworkId::Mainnet),
        pallas_addresses::Network::Testnet => Ok(NetworkId::Testnet),
        _ => Err(anyhow!("Unknown network in address")),
    }
}

fn parse(bytes: &[u8]) -> Result<pallas_addresses::Address> {
    pallas_addresses::Address::from_bytes(bytes).map_err(|e| anyhow!("Invalid address: {e}"))
}

/// Human readable form of raw address bytes
pub fn address_to_bech32(bytes: &[u8]) -> Result<String> {
    parse(bytes)?.to_bech32().map_err(|e| anyhow!("Cannot render address as bech32: {e}"))
}

/// Payment key hash of a Shelley address. Script-locked and Byron addresses
/// have none.
pub fn payment_key_hash(bytes: &[u8]) -> Result<AddrKeyhash> {
    match parse(bytes)? {
        pallas_addresses::Address::Shelley(shelley) => match shelley.payment() {
            pallas_addresses::ShelleyPaymentPart::Key(hash) => AddrKeyhash::try_from(hash.as_ref())
                .map_err(|_| anyhow!("Payment key hash has the wrong length")),
            pallas_addresses::ShelleyPaymentPart::Script(_) => {
                Err(anyhow!("Address is locked by a script"))
            }
        },
        _ => Err(anyhow!("Not a Shelley payment address")),
    }
}

/// Network an address belongs to
pub fn address_network(bytes: &[u8]) -> Result<NetworkId> {
    let network = parse(bytes)?.network().ok_or_else(|| anyhow!("Address carries no network"))?;
    map_network(network)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Enterprise key address on testnet: header 0x60, 28-byte key hash
    fn testnet_enterprise(hash: [u8; 28]) -> Vec<u8> {
        let mut bytes = vec![0x60];
        bytes.extend(hash);
        bytes
    }

    #[test]
    fn extracts_payment_key_hash() {
        let address = testnet_enterprise([7; 28]);
        assert_eq!(payment_key_hash(&address).unwrap(), AddrKeyhash::new([7; 28]));
        assert_eq!(address_network(&address).unwrap(), NetworkId::Testnet);
    }

    #[test]
    fn renders_testnet_prefix() {
        let bech32 = address_to_bech32(&testnet_enterprise([7; 28])).unwrap();
        assert!(bech32.starts_with("addr_test1"), "{bech32}");
    }

    #[test]
    fn script_address_has_no_payment_key() {
        let mut address = vec![0x70];
        address.extend([1; 28]);
        assert!(payment_key_hash(&address).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(address_to_bech32(&[0xff, 0x00]).is_err());
    }
}
