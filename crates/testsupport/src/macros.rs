//! Test setup macros.

/// Create an [`executor::ExecutionContext`] backed by an empty data
/// source, hiding the borrow plumbing each test would otherwise
/// repeat.
///
/// ```
/// use testsupport::prelude::*;
///
/// test_ctx!(ctx);
/// assert!(!ctx.cancel.is_cancelled());
/// ```
#[macro_export]
macro_rules! test_ctx {
    ($ctx:ident) => {
        let mut _source = $crate::EmptyDataSource;
        let _config = ::common::Config::default();
        #[allow(unused_mut)]
        let mut $ctx = ::executor::ExecutionContext::new(
            &mut _source,
            &_config,
            ::common::CancelToken::new(),
        );
    };
    ($ctx:ident, config: $config:expr) => {
        let mut _source = $crate::EmptyDataSource;
        #[allow(unused_mut)]
        let mut $ctx = ::executor::ExecutionContext::new(
            &mut _source,
            $config,
            ::common::CancelToken::new(),
        );
    };
}
