//! NDN-TLV wire encoding.

pub mod tlv;

pub use tlv::{
    content_types, decode_non_negative_integer, encode_non_negative_integer, is_critical,
    signature_types, types, write_non_negative_integer_tlv, write_tlv, write_var_number, Element,
    TlvError, TlvReader,
};
