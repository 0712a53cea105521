/// Registers unit-struct functions into a library. Names already taken are
/// skipped.
#[macro_export]
macro_rules! register_functions {
    ($library:expr; $($fn:path),+ $(,)?) => {{
        use std::sync::Arc;
        $(
            $library.register(Arc::new($fn));
        )+
    }};
}

/// Implements `Function::arguments` over a lazily built static list.
#[macro_export]
macro_rules! fn_arguments {
    ($($spec:expr),* $(,)?) => {
        fn arguments(&self) -> &[$crate::function::ArgSpec] {
            static ARGS: once_cell::sync::Lazy<Vec<$crate::function::ArgSpec>> =
                once_cell::sync::Lazy::new(|| vec![$($spec),*]);
            &ARGS
        }
    };
}
