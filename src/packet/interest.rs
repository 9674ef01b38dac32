use std::time::Duration;

use rand_core::{OsRng, RngCore};

use crate::encoding::{
    decode_non_negative_integer, is_critical, types, write_non_negative_integer_tlv, write_tlv,
    TlvError, TlvReader,
};
use crate::packet::{decode_signature_info_and_value, Data, Name, Signature};

pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_secs(4);

const FORWARDING_HINT: u64 = 0x1e;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub nonce: Option<[u8; 4]>,
    pub lifetime: Duration,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Interest {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            nonce: None,
            lifetime: DEFAULT_INTEREST_LIFETIME,
        }
    }

    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn refresh_nonce(&mut self) {
        let mut nonce = [0u8; 4];
        OsRng.fill_bytes(&mut nonce);
        self.nonce = Some(nonce);
    }

    /// Whether `data` would satisfy this Interest, ignoring freshness.
    pub fn matches_data(&self, data: &Data) -> bool {
        let data_name = data.name();
        if self.name.len() == data_name.len() + 1
            && self
                .name
                .get(-1)
                .map(|c| c.is_implicit_sha256_digest())
                .unwrap_or(false)
        {
            return self.name == data.full_name();
        }
        if self.can_be_prefix {
            self.name.is_prefix_of(data_name)
        } else {
            &self.name == data_name
        }
    }

    /// Portion of a signed Interest covered by its signature: every name
    /// component encoding except the last (the SignatureValue component).
    pub fn signed_portion(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.name.prefix(-1).encode_components(&mut buf);
        buf
    }

    /// Signature carried in the last two name components.
    pub fn signature(&self) -> Result<Signature, TlvError> {
        match (self.name.get(-2), self.name.get(-1)) {
            (Some(info), Some(value)) => decode_signature_info_and_value(info.value(), value.value()),
            _ => Err(TlvError::Malformed(
                "Signed Interest name is too short".to_string(),
            )),
        }
    }

    pub fn wire_encode(&self) -> Vec<u8> {
        let mut value = Vec::new();
        self.name.encode(&mut value);
        if self.can_be_prefix {
            write_tlv(&mut value, types::CAN_BE_PREFIX, &[]);
        }
        if self.must_be_fresh {
            write_tlv(&mut value, types::MUST_BE_FRESH, &[]);
        }
        let nonce = self.nonce.unwrap_or_else(|| {
            let mut nonce = [0u8; 4];
            OsRng.fill_bytes(&mut nonce);
            nonce
        });
        write_tlv(&mut value, types::NONCE, &nonce);
        if self.lifetime != DEFAULT_INTEREST_LIFETIME {
            write_non_negative_integer_tlv(
                &mut value,
                types::INTEREST_LIFETIME,
                self.lifetime.as_millis() as u64,
            );
        }
        let mut buf = Vec::new();
        write_tlv(&mut buf, types::INTEREST, &value);
        buf
    }

    pub fn wire_decode(wire: &[u8]) -> Result<Interest, TlvError> {
        let outer = TlvReader::read_single(wire, types::INTEREST)?;
        let mut reader = TlvReader::new(outer.value);
        let mut interest = Interest::new(Name::decode_value(
            reader.read_expected(types::NAME)?.value,
        )?);

        while !reader.is_empty() {
            let element = reader.read_element()?;
            match element.typ {
                types::CAN_BE_PREFIX => interest.can_be_prefix = true,
                types::MUST_BE_FRESH => interest.must_be_fresh = true,
                types::NONCE => {
                    let nonce: [u8; 4] = element.value.try_into().map_err(|_| {
                        TlvError::Malformed("Nonce must be 4 octets".to_string())
                    })?;
                    interest.nonce = Some(nonce);
                }
                types::INTEREST_LIFETIME => {
                    interest.lifetime =
                        Duration::from_millis(decode_non_negative_integer(element.value)?)
                }
                FORWARDING_HINT => {}
                typ if is_critical(typ) => return Err(TlvError::UnrecognizedCritical(typ)),
                _ => {}
            }
        }
        Ok(interest)
    }
}
