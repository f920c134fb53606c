//! Request client
//!
//! [`RequestClient`] is the single entry point for calls to the API. It owns
//! the admission queue, the offline hold and the interceptor chain.

pub mod admission;
pub mod interceptors;
pub mod offline;
pub mod service;

pub use admission::{AdmissionPermit, AdmissionQueue, PendingRequestRecord};
pub use interceptors::{
    AuthHeaderInterceptor, ClientVersionInterceptor, ContentTypeInterceptor, RequestIdInterceptor,
    RequestInterceptor, ResponseInterceptor,
};
pub use offline::OfflineHold;
pub use service::{ClientStats, RequestClient, RequestClientBuilder};
