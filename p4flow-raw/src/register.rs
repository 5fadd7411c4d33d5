//! Generic register abstractions for type-safe MSR programming

/// Reasons a register value is refused before it reaches hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("required bits 0x{required:X} not set in 0x{value:016X}")]
    MissingRequiredBits { value: u64, required: u64 },

    #[error("field {field} value 0x{value:X} exceeds {width} bits")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        width: u32,
    },
}

/// Trait for register layouts that can be converted to/from raw MSR values
///
/// NetBurst control registers are always programmed read-modify-write, so
/// implementors keep every bit they were read with, including the ones they
/// do not model.
///
/// # Example
///
/// ```
/// use p4flow_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct MyControl(u64);
///
/// impl RegisterLayout for MyControl {
///     fn to_msr_value(&self) -> u64 {
///         self.0
///     }
///
///     fn from_msr_value(value: u64) -> Self {
///         Self(value)
///     }
/// }
///
/// assert_eq!(MyControl::from_msr_value(7).to_msr_value(), 7);
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this register layout to a raw MSR value
    fn to_msr_value(&self) -> u64;

    /// Parse a raw MSR value into this register layout
    fn from_msr_value(value: u64) -> Self;

    /// Check the value is safe to write
    fn validate(&self) -> Result<(), LayoutError> {
        Ok(())
    }
}

/// A hardware register with address and typed layout
#[derive(Debug, Clone, Copy)]
pub struct Register<T: RegisterLayout> {
    /// MSR address
    pub address: u64,
    /// Typed register layout
    pub layout: T,
}

impl<T: RegisterLayout> Register<T> {
    pub fn new(address: u64, layout: T) -> Self {
        Self { address, layout }
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        self.layout.validate()
    }

    pub fn to_msr_value(&self) -> u64 {
        self.layout.to_msr_value()
    }
}
