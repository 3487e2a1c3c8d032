//! Argument encoding for `execute` requests
//!
//! The backend receives arguments as one string joined by [`ARG_DELIMITER`].
//! An argument that itself contains the delimiter cannot be represented, so
//! encoding rejects it instead of silently splitting it in two.
//!
//! The encoding is also lossy for a lone empty argument: `[""]` and `[]` both
//! encode to `""`, which decodes to no arguments.

use crate::error::ProtocolError;

/// Separator between arguments on the wire
pub const ARG_DELIMITER: char = ';';

/// Join arguments for transmission
pub fn encode_args<S: AsRef<str>>(args: &[S]) -> Result<String, ProtocolError> {
    for (index, arg) in args.iter().enumerate() {
        let arg = arg.as_ref();
        if arg.contains(ARG_DELIMITER) {
            return Err(ProtocolError::UnencodableArgument {
                index,
                arg: arg.to_string(),
                delimiter: ARG_DELIMITER,
            });
        }
    }

    let parts: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    Ok(parts.join(ARG_DELIMITER.to_string().as_str()))
}

/// Split a wire argument string back into its parts
pub fn decode_args(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded.split(ARG_DELIMITER).map(String::from).collect()
}
