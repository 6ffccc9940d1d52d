//! Cached HTTP date header value.
//!
//! Formatting the `Date` header on every response is wasteful under load, so a
//! background task refreshes a shared value a little more often than once a second
//! and responses copy the cached bytes.

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::HeaderValue;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    handle: tokio::task::JoinHandle<()>,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService::new_with_update_interval(Duration::from_millis(800)));

impl DateService {
    /// Returns the process-wide instance. Must first be called from within a tokio runtime.
    pub(crate) fn get_global_instance() -> &'static DateService {
        &DATE_SERVICE
    }

    fn new_with_update_interval(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(http_date()));
        let current_arc = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(update_interval).await;
                current_arc.store(Arc::new(http_date()));
            }
        });

        DateService { current, handle }
    }

    pub(crate) fn header_value(&self) -> Option<HeaderValue> {
        // the refresh task dies with the runtime that spawned it
        let date = if self.handle.is_finished() { http_date() } else { self.current.load().as_ref().clone() };
        HeaderValue::from_maybe_shared(date).ok()
    }
}

fn http_date() -> Bytes {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    Bytes::from_owner(buf)
}

impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn header_value_is_imf_fixdate() {
        let value = DateService::get_global_instance().header_value().unwrap();
        let value = value.to_str().unwrap();

        assert_eq!(value.len(), 29);
        assert!(value.ends_with(" GMT"));
    }

    #[test]
    fn formats_on_demand_after_runtime_shutdown() {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
        let service = runtime.block_on(async { DateService::new_with_update_interval(Duration::from_millis(10)) });
        drop(runtime);

        assert!(service.handle.is_finished());
        let value = service.header_value().unwrap();
        assert!(value.to_str().unwrap().ends_with(" GMT"));
    }
}
