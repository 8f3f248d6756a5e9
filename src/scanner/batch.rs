use crate::rpc::types::Address;
use anyhow::Error as AnyError;
use std::fmt;

pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;
pub type ErrorCallback = Box<dyn FnOnce(&AnyError) + Send + 'static>;

/// Group of addresses handed to the downstream script executor.
///
/// The consumer settles the batch exactly once, with [`AddressBatch::complete`]
/// or [`AddressBatch::fail`]. Dropping it unsettled drops the completion
/// callback without running it.
pub struct AddressBatch {
    addresses: Vec<Address>,
    height: u64,
    on_complete: CompletionCallback,
    on_error: Option<ErrorCallback>,
}

impl AddressBatch {
    pub fn new<F>(
        addresses: Vec<Address>,
        height: u64,
        on_complete: F,
        on_error: Option<ErrorCallback>,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            addresses,
            height,
            on_complete: Box::new(on_complete),
            on_error,
        }
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Height the addresses should be evaluated at.
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn complete(self) {
        (self.on_complete)();
    }

    pub fn fail(self, error: AnyError) {
        tracing::warn!(
            height = self.height,
            addresses = self.addresses.len(),
            error = %error,
            "address batch failed downstream"
        );
        if let Some(on_error) = self.on_error {
            on_error(&error);
        }
    }
}

impl fmt::Debug for AddressBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressBatch")
            .field("addresses", &self.addresses)
            .field("height", &self.height)
            .field("has_on_error", &self.on_error.is_some())
            .finish()
    }
}
