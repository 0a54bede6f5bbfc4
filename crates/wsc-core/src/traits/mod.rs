//! Core trait definitions

mod transport;

pub use transport::{
    merge_headers, Headers, Method, Transport, TransportRequest, TransportResponse,
};
