//! Declarative macros to reduce boilerplate across the p4flow codebase

/// Define a metric enum with automatic `name()` and `all()` implementations
///
/// # Example
/// ```
/// use p4flow::metric_enum;
///
/// metric_enum! {
///     pub enum SessionMetric {
///         Samples => "p4flow_samples_total",
///         Scans => "p4flow_overflow_scans_total",
///     }
/// }
///
/// let metric = SessionMetric::Samples;
/// assert_eq!(metric.name(), "p4flow_samples_total");
/// assert_eq!(SessionMetric::all().len(), 2);
/// ```
#[macro_export]
macro_rules! metric_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $str:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }
    };
}

/// Define an enum with name() and all() methods, plus custom data per variant
///
/// # Example
/// ```
/// use p4flow::enum_with_data;
///
/// enum_with_data! {
///     pub enum Unit: u64 {
///         Bpu => ("BPU", 0x300),
///         Ms => ("MS", 0x304),
///     }
///     impl first_counter -> u64
/// }
///
/// assert_eq!(Unit::Ms.name(), "MS");
/// assert_eq!(Unit::Ms.first_counter(), 0x304);
/// ```
#[macro_export]
macro_rules! enum_with_data {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $data_type:ty {
            $($variant:ident => ($str:literal, $data:expr)),* $(,)?
        }
        impl $method:ident -> $return_type:ty
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn $method(&self) -> $return_type {
                match self {
                    $($name::$variant => $data,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }
    };
}
