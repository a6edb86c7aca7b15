use crate::country_client::CountryRecord;
use std::sync::Arc;

/// Last successfully loaded country and its flag bytes.
///
/// Owned by the display loop, which is the only writer. Cartoonize reads a
/// snapshot of the bytes when it is dispatched, so a load that lands later
/// replaces the session without affecting the request already in flight.
#[derive(Debug, Default)]
pub struct Session {
    country: Option<CountryRecord>,
    flag_bytes: Option<Arc<[u8]>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, country: CountryRecord, flag_bytes: Vec<u8>) {
        self.country = Some(country);
        self.flag_bytes = Some(Arc::from(flag_bytes));
    }

    pub fn country(&self) -> Option<&CountryRecord> {
        self.country.as_ref()
    }

    pub fn flag_snapshot(&self) -> Option<Arc<[u8]>> {
        self.flag_bytes.clone()
    }
}
