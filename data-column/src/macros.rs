//! Macros used in the data-column

/// Macros for all of the element types a column can hold
///
/// Tuple: {enum variant name, element type}
macro_rules! for_all_element_types {
    ($macro:ident) => {
        $macro! {
            {Boolean, bool},
            {Int32, i32},
            {Int64, i64},
            {Float64, f64}
        }
    };
}

pub(crate) use for_all_element_types;
