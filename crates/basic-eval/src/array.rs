//! Whole-array expressions (spec §4.F): `a() = b() + c() * d`, an optional
//! dot product `a() = b() . c()`, and a trailing initializer list
//! `a() = 1, 2, 3`.

use basic_core::{arith, BasicError, ErrorCode, Value};
use basic_symbols::{ArrayBinding, FieldType};

/// `a() = b() <op> c()` / `a() = b() <op> scalar`: apply a binary numeric
/// op element-wise. `rhs_array` must have the same shape as `target` when
/// present.
pub fn combine_elementwise(
    target: &ArrayBinding,
    rhs_array: Option<&ArrayBinding>,
    rhs_scalar: Option<Value>,
    op: impl Fn(Value, Value) -> Result<Value, BasicError>,
) -> Result<Vec<Value>, BasicError> {
    if let Some(rhs) = rhs_array {
        if rhs.dims != target.dims {
            return Err(BasicError::with_message(ErrorCode::BAD_USE_OF_ARRAY, "array shapes don't match"));
        }
        target
            .data
            .iter()
            .zip(&rhs.data)
            .map(|(&a, &b)| op(a, b))
            .collect()
    } else if let Some(b) = rhs_scalar {
        target.data.iter().map(|&a| op(a, b)).collect()
    } else {
        Err(BasicError::with_message(ErrorCode::BAD_USE_OF_ARRAY, "missing right-hand side"))
    }
}

/// `a() = b() . c()`: matrix product between a `(rows × k)` and
/// `(k × cols)` array, both given as flat row-major `Vec<Value>` with
/// their 2-D `dims`. The result's shape must match `target`'s.
pub fn dot_product(lhs: &ArrayBinding, rhs: &ArrayBinding) -> Result<Vec<Value>, BasicError> {
    let (&lrows, &lcols) = match lhs.dims.as_slice() {
        [r, c] => (r, c),
        _ => return Err(BasicError::with_message(ErrorCode::BAD_USE_OF_ARRAY, "dot product needs a 2-D array")),
    };
    let (&rrows, &rcols) = match rhs.dims.as_slice() {
        [r, c] => (r, c),
        _ => return Err(BasicError::with_message(ErrorCode::BAD_USE_OF_ARRAY, "dot product needs a 2-D array")),
    };
    if lcols != rrows {
        return Err(BasicError::with_message(ErrorCode::BAD_USE_OF_ARRAY, "inner dimensions don't match"));
    }
    let mut out = Vec::with_capacity(lrows * rcols);
    for i in 0..lrows {
        for j in 0..rcols {
            let mut sum = Value::Int(0);
            for k in 0..lcols {
                let a = lhs.data[i * lcols + k];
                let b = rhs.data[k * rcols + j];
                sum = arith::add(sum, arith::mul(a, b)?)?;
            }
            out.push(sum);
        }
    }
    Ok(out)
}

/// `a() = 1, 2, 3, ...`: fill `target` from a flat initializer list,
/// truncated (or left unchanged past the end) to the array's size.
pub fn fill_from_initializer_list(target: &mut ArrayBinding, values: &[Value]) {
    for (slot, value) in target.data.iter_mut().zip(values) {
        *slot = *value;
    }
}

/// `SUM a()`: add every element of a numeric array. Errors on a string
/// array — string `SUM` (total length) isn't part of this evaluator's
/// builtin set.
pub fn sum(array: &ArrayBinding) -> Result<Value, BasicError> {
    if array.kind == FieldType::Str {
        return Err(BasicError::with_message(ErrorCode::TYPE_MISMATCH, "SUM needs a numeric array"));
    }
    let mut total = Value::Int(0);
    for &v in &array.data {
        total = arith::add(total, v)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_array(dims: Vec<usize>, values: &[i64]) -> ArrayBinding {
        let mut a = ArrayBinding::new(FieldType::Int, dims, Value::Int(0)).unwrap();
        for (slot, &v) in a.data.iter_mut().zip(values) {
            *slot = Value::Int(v);
        }
        a
    }

    #[test]
    fn elementwise_add_matches_shapes() {
        let a = int_array(vec![3], &[1, 2, 3]);
        let b = int_array(vec![3], &[10, 20, 30]);
        let result = combine_elementwise(&a, Some(&b), None, arith::add).unwrap();
        assert_eq!(result, vec![Value::Int(11), Value::Int(22), Value::Int(33)]);
    }

    #[test]
    fn elementwise_rejects_mismatched_shapes() {
        let a = int_array(vec![3], &[1, 2, 3]);
        let b = int_array(vec![2], &[10, 20]);
        let err = combine_elementwise(&a, Some(&b), None, arith::add).unwrap_err();
        assert_eq!(err.code, ErrorCode::BAD_USE_OF_ARRAY);
    }

    #[test]
    fn dot_product_multiplies_matrices() {
        // [1 2; 3 4] . [5 6; 7 8] = [19 22; 43 50]
        let a = int_array(vec![2, 2], &[1, 2, 3, 4]);
        let b = int_array(vec![2, 2], &[5, 6, 7, 8]);
        let result = dot_product(&a, &b).unwrap();
        assert_eq!(result, vec![Value::Int(19), Value::Int(22), Value::Int(43), Value::Int(50)]);
    }

    #[test]
    fn initializer_list_truncates_to_array_size() {
        let mut a = int_array(vec![3], &[0, 0, 0]);
        fill_from_initializer_list(&mut a, &[Value::Int(7), Value::Int(8), Value::Int(9), Value::Int(10)]);
        assert_eq!(a.data, vec![Value::Int(7), Value::Int(8), Value::Int(9)]);
    }
}
