use ndarray::{array, ArrayD, IxDyn};

use super::*;

#[test]
fn test_default_is_periodic() {
  let bc = BoundaryConds::<3>::default();
  for axis in 0..3 {
    assert_eq!(bc.axis(axis), [BcCode::Periodic; 2]);
  }
}

#[test]
fn test_from_array_accepts_valid_matrix() {
  let bc = BoundaryConds::<3>::from_array(array![[1, 1], [0, 3], [2, 5]].view())
    .expect("valid boundary matrix");

  assert_eq!(bc.get(0, Side::Left), BcCode::Periodic);
  assert_eq!(bc.get(1, Side::Right), BcCode::Dirichlet);
  assert_eq!(bc.get(2, Side::Right), BcCode::Neumann);
  assert_eq!(bc.to_array(), array![[1, 1], [0, 3], [2, 5]]);
}

/// Accepted iff every code is in 0..=5 and periodicity is paired.
#[test]
fn test_is_valid_bc_exhaustive_1d() {
  for left in -1..=6 {
    for right in -1..=6 {
      let in_range = (0..=5).contains(&left) && (0..=5).contains(&right);
      let paired = (left == 1) == (right == 1);
      assert_eq!(
        BoundaryConds::<1>::is_valid_bc(array![[left, right]].view()),
        in_range && paired,
        "codes ({left}, {right})"
      );
    }
  }
}

#[test]
fn test_wrong_shape_rejected() {
  let err = BoundaryConds::<3>::from_array(array![[1, 1, 1], [1, 1, 1], [1, 1, 1]].view())
    .unwrap_err();
  assert_eq!(
    err,
    DiffError::InvalidBoundaryShape {
      ndim: 3,
      shape: vec![3, 3]
    }
  );

  assert!(!BoundaryConds::<3>::is_valid_bc(array![[1, 1], [1, 1]].view()));
}

#[test]
fn test_wrong_rank_rejected() {
  let cube = ArrayD::<i32>::ones(IxDyn(&[2, 2, 2]));
  assert!(matches!(
    BoundaryConds::<2>::from_dyn(cube.view()),
    Err(DiffError::InvalidBoundaryShape { .. })
  ));

  let square = ArrayD::<i32>::from_elem(IxDyn(&[2, 2]), 2);
  assert_eq!(
    BoundaryConds::<2>::from_dyn(square.view()),
    Ok(BoundaryConds::free())
  );
}

/// One-sided periodic is rejected whichever side carries the flag.
#[test]
fn test_one_sided_periodic_rejected() {
  assert_eq!(
    BoundaryConds::<2>::from_array(array![[2, 2], [1, 0]].view()),
    Err(DiffError::UnpairedPeriodic { axis: 1 })
  );
  assert_eq!(
    BoundaryConds::<2>::from_array(array![[0, 1], [2, 2]].view()),
    Err(DiffError::UnpairedPeriodic { axis: 0 })
  );
}

#[test]
fn test_set_revalidates() {
  let mut bc = BoundaryConds::<2>::free();

  bc.set(1, Side::Left, BcCode::Dirichlet).expect("free/Dirichlet is valid");
  assert_eq!(bc.get(1, Side::Left), BcCode::Dirichlet);

  assert_eq!(
    bc.set(0, Side::Right, BcCode::Periodic),
    Err(DiffError::UnpairedPeriodic { axis: 0 })
  );
  // Rejected change leaves the conditions untouched.
  assert_eq!(bc.get(0, Side::Right), BcCode::Free);

  assert_eq!(
    bc.set(2, Side::Left, BcCode::Free),
    Err(DiffError::InvalidAxis { axis: 2, ndim: 2 })
  );
}

#[test]
fn test_code_roundtrip() {
  for code in BcCode::ALL {
    assert_eq!(BcCode::try_from(code.code()), Ok(code));
  }
  assert_eq!(
    BcCode::try_from(6),
    Err(DiffError::InvalidBoundaryCode { code: 6 })
  );
}

#[test]
fn test_display() {
  let bc = BoundaryConds::<2>::from_array(array![[0, 3], [1, 1]].view()).expect("valid");
  assert_eq!(
    bc.to_string(),
    "BoundaryConditions(zero:Dirichlet, periodic:periodic)"
  );
}

#[test]
fn test_boundary_function_codes() {
  let needs: Vec<_> = BcCode::ALL
    .into_iter()
    .filter(|code| code.needs_boundary_function())
    .collect();
  assert_eq!(needs, vec![BcCode::Dirichlet, BcCode::Neumann]);
}
