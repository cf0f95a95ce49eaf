//! PebbleKit wire formats.
//!
//! Layered on `pebblekit-transport`'s [`Bundle`](pebblekit_transport::Bundle):
//! - [`dictionary`]: the typed, integer-keyed application payload
//! - [`result`]: transmission and receive outcome taxonomies
//! - [`keys`] and [`envelope`]: action tags and typed request envelopes
//! - [`model`]: watch and watchapp value objects

pub mod dictionary;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod model;
pub mod result;

pub use dictionary::{
    check_fits, decode_dictionary, dictionary_size, encode_dictionary, Dictionary,
    DictionaryItem, ItemType, DICTIONARY_HEADER_SIZE, TUPLE_HEADER_SIZE,
};
pub use envelope::{
    decode_receive_reply, decode_transmission_results, encode_receive_reply,
    encode_transmission_results, AppControl, AppControlRequest, AppLifecycleEvent, Lifecycle,
    ReceiveDataRequest, SendDataRequest, TransmissionResults, MISSING_TRANSMISSION_RESULT,
};
pub use error::{CodecError, Result};
pub use keys::{action_tag, Action};
pub use model::{ConnectedWatch, WatchIdentifier, Watchapp, WatchappType};
pub use result::{ReceiveResult, TransmissionResult};
