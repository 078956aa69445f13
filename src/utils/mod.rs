//! Utility functions and helpers
//!
//! Small shape and size helpers shared by the exporters, the synthesizer
//! and the CLI summaries.

/// Shape utilities
pub mod shape_utils {
    /// Number of elements in a tensor of the given shape
    ///
    /// An empty shape (a scalar) has one element.
    pub fn element_count(shape: &[usize]) -> usize {
        shape.iter().product()
    }

    /// Render a shape the way the summaries print it, e.g. `(1, 3, 32, 32)`
    pub fn format_shape(shape: &[usize]) -> String {
        match shape {
            [single] => format!("({},)", single),
            _ => {
                let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
                format!("({})", dims.join(", "))
            }
        }
    }
}

/// Size utilities
pub mod size_utils {
    /// Size in megabytes of `params` float32 parameters
    pub fn params_size_mb(params: usize) -> f64 {
        params as f64 * 4.0 / 1024.0 / 1024.0
    }

    /// Group digits with commas, e.g. `54584` -> `54,584`
    pub fn with_thousands(n: usize) -> String {
        let digits = n.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }

    /// Lowercase hex rendering of a byte slice
    pub fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
