use super::*;

#[test]
fn test_default_is_valid() {
  assert_eq!(MraConfig::<3>::default().validate(), Ok(()));
  assert_eq!(WorldConfig::default().validate(), Ok(()));
  assert_eq!(WorldConfig::default().vector_chunk, 8);
}

#[test]
fn test_cell_width_and_reciprocal() {
  let config = MraConfig::<2>::default().with_cell([[0.0, 1.0], [-2.0, 2.0]]);

  assert_eq!(config.cell_width(0), 1.0);
  assert_eq!(config.cell_width(1), 4.0);
  assert_eq!(config.rcell_width(1), 0.25);
}

#[test]
fn test_simulation_roundtrip() {
  let config = MraConfig::<2>::default().with_cell([[-1.0, 3.0], [10.0, 12.0]]);

  let sim = config.to_simulation([1.0, 11.5]).expect("inside cell");
  assert_eq!(sim, [0.5, 0.75]);
  assert_eq!(config.to_user(sim), [1.0, 11.5]);

  assert_eq!(
    config.to_simulation([3.5, 11.0]),
    Err(DiffError::OutsideDomain)
  );
}

#[test]
fn test_invalid_order() {
  assert_eq!(
    MraConfig::<1>::default().with_k(0).validate(),
    Err(DiffError::InvalidOrder { k: 0 })
  );
}

#[test]
fn test_invalid_cell() {
  let config = MraConfig::<2>::default().with_cell([[0.0, 1.0], [1.0, 1.0]]);
  assert_eq!(config.validate(), Err(DiffError::InvalidCell { axis: 1 }));

  let config = MraConfig::<1>::default().with_uniform_cell(0.0, f64::INFINITY);
  assert_eq!(config.validate(), Err(DiffError::InvalidCell { axis: 0 }));
}

#[test]
fn test_invalid_levels() {
  let config = MraConfig::<1>::default()
    .with_initial_level(5)
    .with_max_level(3);
  assert!(matches!(
    config.validate(),
    Err(DiffError::InvalidLevels { initial: 5, max: 3, .. })
  ));
}

#[test]
fn test_world_config_rejects_zero_ranks() {
  assert!(matches!(
    WorldConfig::default().with_ranks(0).validate(),
    Err(DiffError::InvalidWorld(_))
  ));
  assert!(matches!(
    WorldConfig::default().with_vector_chunk(0).validate(),
    Err(DiffError::InvalidWorld(_))
  ));
}
