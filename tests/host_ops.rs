use briny_linalg::approx::{all_close, first_mismatch, is_close};
use briny_linalg::*;

const N: usize = 256;
const PCT: f64 = 0.01;

fn seq<L: MemoryLayout>(h: usize, w: usize, scale: f32) -> HostMatrix<f32, L> {
    let mut m = HostMatrix::<f32, L>::new(h, w).unwrap();
    sequence(&mut m).unwrap();
    if scale != 1.0 {
        apply_scalar(&mut m, ScalarFunctor::Mult(scale)).unwrap();
    }
    m
}

#[test]
fn test_exp_variants_agree() {
    let mut fast = seq::<ColumnMajor>(N, N, 1e-3);
    let mut exact = fast.clone();
    apply_scalar(&mut fast, ScalarFunctor::Exp).unwrap();
    apply_scalar(&mut exact, ScalarFunctor::ExactExp).unwrap();
    assert!(all_close(fast.data(), exact.data(), EXP_TOLERANCE * 100.0));
}

#[test]
fn test_sequence_add_then_binary_add() {
    let mut v = seq::<ColumnMajor>(N, N, 1.0);
    let w = seq::<ColumnMajor>(N, N, 1.0);
    apply_scalar(&mut v, ScalarFunctor::Add(1.0)).unwrap();
    for (i, &x) in v.data().iter().enumerate() {
        assert_eq!(x, (i + 1) as f32);
    }
    apply_binary(&mut v, &w, BinaryFunctor::Add).unwrap();
    for (i, &x) in v.data().iter().enumerate() {
        assert_eq!(x, (i + i + 1) as f32);
    }
}

#[test]
fn test_axpy_scales_source() {
    let mut v = seq::<ColumnMajor>(N, N, 1.0);
    let w = seq::<ColumnMajor>(N, N, 1.0);
    apply_binary(&mut v, &w, BinaryFunctor::Axpy(2.0)).unwrap();
    for (i, &x) in v.data().iter().enumerate() {
        assert_eq!(x, (3 * i) as f32);
    }
}

#[test]
fn test_copy() {
    let mut v = HostMatrix::<f32>::new(N, N).unwrap();
    let w = seq::<ColumnMajor>(N, N, 1.0);
    copy(&mut v, &w).unwrap();
    assert_eq!(v.data(), w.data());
}

#[test]
fn test_scalar_add_fractional() {
    let mut v = seq::<ColumnMajor>(N, N, 1.0);
    apply_scalar(&mut v, ScalarFunctor::Add(3.8)).unwrap();
    for (i, &x) in v.data().iter().enumerate() {
        assert_eq!(x, i as f32 + 3.8);
    }
}

#[test]
fn test_axpby() {
    let w = seq::<ColumnMajor>(N, N, 1.0);
    let mut v = seq::<ColumnMajor>(N, N, 1.0);
    apply_scalar(&mut v, ScalarFunctor::Add(1.0)).unwrap();
    assert_eq!(w.data()[0], 0.0);
    assert_eq!(v.data()[0], 1.0);

    // dst = 2 * src + 3 * dst
    apply_binary(&mut v, &w, BinaryFunctor::Axpby(2.0, 3.0)).unwrap();
    for (i, &x) in v.data().iter().enumerate() {
        assert_eq!(x, (2 * i + 3 * (i + 1)) as f32);
    }
}

#[test]
fn test_sequence_and_fill() {
    let v = seq::<RowMajor>(N, N, 1.0);
    for (i, &x) in v.data().iter().enumerate() {
        assert_eq!(x, i as f32);
    }
    let mut w = HostMatrix::<f32>::new(N, N).unwrap();
    fill(&mut w, 1.0).unwrap();
    assert!(w.data().iter().all(|&x| x == 1.0));
}

#[test]
fn test_norms() {
    let v = seq::<ColumnMajor>(N, N, 1.0);
    let (mut l1, mut l2) = (0.0f64, 0.0f64);
    for &x in v.data() {
        l1 += f64::from(x).abs();
        l2 += f64::from(x) * f64::from(x);
    }
    assert!(is_close(norm1(&v).unwrap(), l1, PCT));
    assert!(is_close(norm2(&v).unwrap(), l2.sqrt(), PCT));
}

/// `sum_k a(i, k) * b(j, k)` computed directly in `f64`.
fn reference_nt<LA: MemoryLayout, LB: MemoryLayout>(a: &HostMatrix<f32, LA>, b: &HostMatrix<f32, LB>) -> Vec<f64> {
    let mut out = Vec::with_capacity(a.height() * b.height());
    for i in 0..a.height() {
        for j in 0..b.height() {
            out.push(
                (0..a.width())
                    .map(|k| f64::from(a[(i, k)]) * f64::from(b[(j, k)]))
                    .sum(),
            );
        }
    }
    out
}

#[test]
fn test_product_nt() {
    let x = seq::<ColumnMajor>(N, N, 0.01);
    let z = seq::<ColumnMajor>(N, N, 0.01);
    let mut r = HostMatrix::<f32>::new(N, N).unwrap();
    product(&mut r, &x, &z, false, true).unwrap();

    let expected = reference_nt(&x, &z);
    let got: Vec<f64> = r.to_rows().unwrap().into_iter().map(f64::from).collect();
    assert_eq!(first_mismatch(&got, &expected, PCT), None);
}

#[test]
fn test_product_vector_times_transposed_matrix() {
    let s = seq::<ColumnMajor>(1, N, 0.01);
    let z = seq::<ColumnMajor>(N, N, 0.01);
    let mut t = HostMatrix::<f32>::new(1, N).unwrap();
    product(&mut t, &s, &z, false, true).unwrap();

    for i in 0..N {
        let val: f64 = (0..N).map(|j| f64::from(s[(0, j)]) * f64::from(z[(i, j)])).sum();
        assert!(is_close(f64::from(t[(0, i)]), val, PCT), "column {i}");
    }

    // same result as the general dense product padded to a full matrix
    let mut padded = HostMatrix::<f32>::new(N, N).unwrap();
    let mut full = HostMatrix::<f32>::new(N, N).unwrap();
    for j in 0..N {
        padded[(0, j)] = s[(0, j)];
    }
    product(&mut full, &padded, &z, false, true).unwrap();
    for i in 0..N {
        assert_eq!(full[(0, i)], t[(0, i)]);
    }
}

#[test]
fn test_product_layouts_do_not_change_results() {
    let a_cm = seq::<ColumnMajor>(3, 5, 0.5);
    let b_cm = seq::<ColumnMajor>(5, 4, 0.25);
    let mut a_rm = HostMatrix::<f32, RowMajor>::new(3, 5).unwrap();
    let mut b_rm = HostMatrix::<f32, RowMajor>::new(5, 4).unwrap();
    convert(&mut a_rm, &a_cm).unwrap();
    convert(&mut b_rm, &b_cm).unwrap();

    let mut c1 = HostMatrix::<f32, ColumnMajor>::new(3, 4).unwrap();
    let mut c2 = HostMatrix::<f32, RowMajor>::new(3, 4).unwrap();
    product(&mut c1, &a_cm, &b_rm, false, false).unwrap();
    product(&mut c2, &a_rm, &b_cm, false, false).unwrap();
    assert_eq!(c1.to_rows().unwrap(), c2.to_rows().unwrap());
}

#[test]
fn test_product_transposed_lhs() {
    let a = seq::<ColumnMajor>(5, 3, 1.0);
    let b = seq::<RowMajor>(5, 2, 1.0);
    let mut c = HostMatrix::<f32>::new(3, 2).unwrap();
    product(&mut c, &a, &b, true, false).unwrap();
    for i in 0..3 {
        for j in 0..2 {
            let expected: f32 = (0..5).map(|k| a[(k, i)] * b[(k, j)]).sum();
            assert_eq!(c[(i, j)], expected);
        }
    }
}

fn check_column_broadcast<L: MemoryLayout>() {
    let mut x = seq::<L>(N, N, 1.0);
    let z = seq::<L>(N, N, 1.0);
    let x_vec = seq::<ColumnMajor>(N, 1, 1.0);
    add_column_broadcast(&mut x, &x_vec).unwrap();
    for i in 0..N {
        for j in 0..N {
            assert_eq!(x[(i, j)], z[(i, j)] + x_vec[(i, 0)]);
        }
    }
}

#[test]
fn test_matrix_plus_column() {
    check_column_broadcast::<ColumnMajor>();
}

#[test]
fn test_matrix_plus_column_row_major() {
    check_column_broadcast::<RowMajor>();
}

#[test]
fn test_matrix_plus_row() {
    let mut x = seq::<RowMajor>(4, 6, 1.0);
    let z = x.clone();
    let row = seq::<RowMajor>(1, 6, 10.0);
    add_row_broadcast(&mut x, &row).unwrap();
    for i in 0..4 {
        for j in 0..6 {
            assert_eq!(x[(i, j)], z[(i, j)] + row[(0, j)]);
        }
    }
}

#[test]
fn test_reduce_to_column() {
    let x = seq::<ColumnMajor>(N, N, 1.0);
    let mut x_col = HostMatrix::<f32>::vector(N).unwrap();
    reduce_rows_to_column(&mut x_col, &x).unwrap();
    for i in 0..N {
        let correct: f64 = (0..N).map(|j| f64::from(x[(i, j)])).sum();
        assert!(is_close(correct, f64::from(x_col[(i, 0)]), PCT), "row {i}");
    }
}

#[test]
fn test_reduce_to_row() {
    let x = seq::<RowMajor>(7, 3, 1.0);
    let mut row = HostMatrix::<f32>::new(1, 3).unwrap();
    reduce_columns_to_row(&mut row, &x).unwrap();
    for j in 0..3 {
        let correct: f32 = (0..7).map(|i| x[(i, j)]).sum();
        assert_eq!(row[(0, j)], correct);
    }
}

#[test]
fn test_integer_buffers() {
    let mut a = HostMatrix::<i32>::new(N, 1).unwrap();
    let mut b = HostMatrix::<i32>::new(N, 1).unwrap();
    sequence(&mut a).unwrap();
    fill(&mut b, 3).unwrap();
    apply_binary(&mut a, &b, BinaryFunctor::Mult).unwrap();
    apply_scalar(&mut a, ScalarFunctor::Negate).unwrap();
    assert_eq!(a.data()[10], -30);
    assert_eq!(norm1(&a).unwrap(), f64::from(3 * (0..N as i32).sum::<i32>()));

    let err = apply_scalar(&mut a, ScalarFunctor::Exp).unwrap_err();
    assert!(matches!(err, KernelError::UnsupportedOperation { .. }));
}

#[test]
fn test_integer_norms_are_exact() {
    let mut v = HostMatrix::<i8>::vector(4).unwrap();
    fill(&mut v, 100).unwrap();
    assert_eq!(norm1(&v).unwrap(), 400.0);
    assert_eq!(norm2(&v).unwrap(), 200.0);

    let big: HostMatrix<i32> = matrix!([i32::MAX, i32::MIN]).unwrap();
    assert_eq!(norm1(&big).unwrap(), f64::from(i32::MAX) + 2f64.powi(31));
}

#[test]
fn test_rprop_and_weight_decay_shapes() {
    let mut w = HostMatrix::<f32>::new(4, 4).unwrap();
    let g = HostMatrix::<f32>::new(4, 4).unwrap();
    let mut s = HostMatrix::<i8>::new(4, 4).unwrap();
    let mut r = HostMatrix::<f32>::new(4, 3).unwrap();
    let err = rprop(&mut w, &g, &mut s, &mut r).unwrap_err();
    assert!(matches!(err, KernelError::ShapeMismatch { op: "rprop", .. }));

    let short = HostMatrix::<f32>::new(4, 1).unwrap();
    assert!(weight_decay(&mut w, &short, 0.1, 0.01).is_err());
}
