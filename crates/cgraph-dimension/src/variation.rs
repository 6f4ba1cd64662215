//! Generalization/specialization relations across all dimensions.
//!
//! A point `G` generalizes a point `S` when, in every dimension, `G`'s value
//! lies on the generalization chain of `S`'s value. The distance between the
//! two is the per-dimension chain offset; candidates are ranked by that
//! distance vector with earlier dimensions more significant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DimensionsConfig;
use crate::dimension::ContentDimensionSource;
use crate::error::{DimensionError, DimensionResult};
use crate::point::DimensionSpacePoint;

/// How a target point relates to an origin point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantRelation {
    Same,
    /// The target is a specialization of the origin.
    Specialization,
    /// The target is a generalization of the origin.
    Generalization,
    /// Neither generalizes the other.
    Peer,
}

/// Precomputed view over the configured dimension space.
#[derive(Clone, Debug)]
pub struct InterDimensionalVariationGraph {
    source: ContentDimensionSource,
    allowed: Vec<DimensionSpacePoint>,
}

impl InterDimensionalVariationGraph {
    pub fn new(source: ContentDimensionSource) -> Self {
        let allowed = cartesian(
            source
                .dimensions()
                .iter()
                .map(|d| {
                    (
                        d.id().to_string(),
                        d.values().iter().map(|v| v.value.clone()).collect(),
                    )
                })
                .collect(),
        );
        Self { source, allowed }
    }

    /// A dimension space with no dimensions: the default point only.
    pub fn empty() -> Self {
        Self::new(ContentDimensionSource::default())
    }

    pub fn from_config(config: &DimensionsConfig) -> DimensionResult<Self> {
        Ok(Self::new(ContentDimensionSource::from_config(config)?))
    }

    pub fn source(&self) -> &ContentDimensionSource {
        &self.source
    }

    /// Every point of the dimension space, in dimension-value order.
    pub fn allowed_points(&self) -> &[DimensionSpacePoint] {
        &self.allowed
    }

    pub fn is_allowed(&self, point: &DimensionSpacePoint) -> bool {
        self.validate(point).is_ok()
    }

    /// Check that `point` names exactly the configured dimensions with known
    /// values.
    pub fn validate(&self, point: &DimensionSpacePoint) -> DimensionResult<()> {
        self.chains(point).map(|_| ())
    }

    /// Per dimension: the generalization chain of the point's value.
    fn chains<'a>(&'a self, point: &'a DimensionSpacePoint) -> DimensionResult<Vec<(&'a str, Vec<&'a str>)>> {
        let not_allowed = |reason: String| DimensionError::PointNotAllowed {
            point: point.to_json(),
            reason,
        };
        if point.coordinates().len() != self.source.dimensions().len() {
            return Err(not_allowed(format!(
                "expected {} coordinates, got {}",
                self.source.dimensions().len(),
                point.coordinates().len()
            )));
        }
        self.source
            .dimensions()
            .iter()
            .map(|dimension| {
                let value = point
                    .coordinate(dimension.id())
                    .ok_or_else(|| not_allowed(format!("missing dimension {}", dimension.id())))?;
                if !dimension.contains(value) {
                    return Err(not_allowed(format!(
                        "{value} is not a value of dimension {}",
                        dimension.id()
                    )));
                }
                Ok((dimension.id(), dimension.generalization_chain(value)))
            })
            .collect()
    }

    /// All generalizations of `point`, closest first.
    pub fn generalizations(
        &self,
        point: &DimensionSpacePoint,
        include_self: bool,
    ) -> DimensionResult<Vec<DimensionSpacePoint>> {
        let chains = self.chains(point)?;
        let mut candidates: Vec<(Vec<u32>, DimensionSpacePoint)> = vec![(Vec::new(), DimensionSpacePoint::default_point())];
        for (dimension, chain) in &chains {
            let mut next = Vec::with_capacity(candidates.len() * chain.len());
            for (weight, partial) in &candidates {
                for (distance, value) in chain.iter().enumerate() {
                    let mut w = weight.clone();
                    w.push(distance as u32);
                    next.push((w, partial.with_coordinate(*dimension, *value)));
                }
            }
            candidates = next;
        }
        candidates.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(candidates
            .into_iter()
            .filter(|(w, _)| include_self || w.iter().any(|d| *d > 0))
            .map(|(_, p)| p)
            .collect())
    }

    /// All specializations of `point`, closest first.
    pub fn specializations(
        &self,
        point: &DimensionSpacePoint,
        include_self: bool,
    ) -> DimensionResult<Vec<DimensionSpacePoint>> {
        self.validate(point)?;
        let mut found: Vec<(Vec<u32>, DimensionSpacePoint)> = Vec::new();
        for candidate in &self.allowed {
            if !include_self && candidate == point {
                continue;
            }
            if let Ok(weight) = self.weight(candidate, point) {
                found.push((weight, candidate.clone()));
            }
        }
        found.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(found.into_iter().map(|(_, p)| p).collect())
    }

    /// Per-dimension distance from `specialization` up to `generalization`.
    ///
    /// Fails with [`DimensionError::InvalidGeneralization`] if
    /// `generalization` does not generalize `specialization`.
    pub fn weight(
        &self,
        specialization: &DimensionSpacePoint,
        generalization: &DimensionSpacePoint,
    ) -> DimensionResult<Vec<u32>> {
        let chains = self.chains(specialization)?;
        self.validate(generalization)?;
        chains
            .iter()
            .map(|(dimension, chain)| {
                let target = generalization.coordinate(dimension).unwrap_or_default();
                chain
                    .iter()
                    .position(|v| *v == target)
                    .map(|d| d as u32)
                    .ok_or_else(|| DimensionError::InvalidGeneralization {
                        dimension: dimension.to_string(),
                        value: chain.first().copied().unwrap_or_default().to_string(),
                        generalization: target.to_string(),
                        reason: format!(
                            "{generalization} is not a generalization of {specialization}"
                        ),
                    })
            })
            .collect()
    }

    /// Whether `generalization` equals or generalizes `specialization`.
    pub fn is_generalization_of(
        &self,
        generalization: &DimensionSpacePoint,
        specialization: &DimensionSpacePoint,
    ) -> bool {
        self.weight(specialization, generalization).is_ok()
    }

    /// The closest strict generalization of `point`, if any.
    pub fn primary_generalization(
        &self,
        point: &DimensionSpacePoint,
    ) -> DimensionResult<Option<DimensionSpacePoint>> {
        Ok(self.generalizations(point, false)?.into_iter().next())
    }

    /// How `target` relates to `origin`.
    pub fn relation(&self, origin: &DimensionSpacePoint, target: &DimensionSpacePoint) -> VariantRelation {
        if origin == target {
            VariantRelation::Same
        } else if self.is_generalization_of(origin, target) {
            VariantRelation::Specialization
        } else if self.is_generalization_of(target, origin) {
            VariantRelation::Generalization
        } else {
            VariantRelation::Peer
        }
    }
}

impl Default for InterDimensionalVariationGraph {
    fn default() -> Self {
        Self::empty()
    }
}

fn cartesian(dimensions: Vec<(String, Vec<String>)>) -> Vec<DimensionSpacePoint> {
    let mut points = vec![BTreeMap::<String, String>::new()];
    for (dimension, values) in dimensions {
        let mut next = Vec::with_capacity(points.len() * values.len());
        for partial in &points {
            for value in &values {
                let mut p = partial.clone();
                p.insert(dimension.clone(), value.clone());
                next.push(p);
            }
        }
        points = next;
    }
    points.into_iter().map(DimensionSpacePoint::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DimensionConfig, DimensionValueConfig};

    fn point(language: &str, market: &str) -> DimensionSpacePoint {
        DimensionSpacePoint::new([("language", language), ("market", market)])
    }

    fn graph() -> InterDimensionalVariationGraph {
        let config = DimensionsConfig {
            dimensions: vec![
                DimensionConfig::new("language")
                    .with_value(
                        "en",
                        DimensionValueConfig::leaf()
                            .with_specialization("en_US", DimensionValueConfig::leaf()),
                    )
                    .with_value("de", DimensionValueConfig::leaf()),
                DimensionConfig::new("market").with_value(
                    "world",
                    DimensionValueConfig::leaf().with_specialization("US", DimensionValueConfig::leaf()),
                ),
            ],
        };
        InterDimensionalVariationGraph::from_config(&config).unwrap()
    }

    #[test]
    fn empty_space_has_only_default_point() {
        let g = InterDimensionalVariationGraph::empty();
        assert_eq!(g.allowed_points(), &[DimensionSpacePoint::default_point()]);
        assert!(g.is_allowed(&DimensionSpacePoint::default_point()));
        assert_eq!(
            g.generalizations(&DimensionSpacePoint::default_point(), true).unwrap(),
            vec![DimensionSpacePoint::default_point()]
        );
    }

    #[test]
    fn allowed_points_are_cartesian_product() {
        assert_eq!(graph().allowed_points().len(), 3 * 2);
    }

    #[test]
    fn unknown_value_is_not_allowed() {
        let g = graph();
        assert!(!g.is_allowed(&point("fr", "world")));
        assert!(!g.is_allowed(&DimensionSpacePoint::new([("language", "en")])));
    }

    #[test]
    fn generalizations_are_ordered_by_weight() {
        let g = graph();
        let gens = g.generalizations(&point("en_US", "US"), true).unwrap();
        assert_eq!(
            gens,
            vec![
                point("en_US", "US"),
                point("en_US", "world"),
                point("en", "US"),
                point("en", "world"),
            ]
        );
        let strict = g.generalizations(&point("en_US", "US"), false).unwrap();
        assert_eq!(strict.len(), 3);
        assert_eq!(strict[0], point("en_US", "world"));
    }

    #[test]
    fn specializations_include_all_descendants() {
        let g = graph();
        let specs = g.specializations(&point("en", "world"), false).unwrap();
        assert_eq!(specs.len(), 3);
        assert!(specs.contains(&point("en_US", "US")));
        assert!(!specs.contains(&point("de", "world")));
    }

    #[test]
    fn weight_rejects_non_generalization() {
        let g = graph();
        assert_eq!(g.weight(&point("en_US", "US"), &point("en", "world")).unwrap(), vec![1, 1]);
        assert!(matches!(
            g.weight(&point("en", "world"), &point("en_US", "world")),
            Err(DimensionError::InvalidGeneralization { .. })
        ));
        assert!(matches!(
            g.weight(&point("de", "world"), &point("en", "world")),
            Err(DimensionError::InvalidGeneralization { .. })
        ));
    }

    #[test]
    fn primary_generalization_is_closest() {
        let g = graph();
        assert_eq!(
            g.primary_generalization(&point("en_US", "world")).unwrap(),
            Some(point("en", "world"))
        );
        assert_eq!(g.primary_generalization(&point("de", "world")).unwrap(), None);
    }

    #[test]
    fn relations() {
        let g = graph();
        let en = point("en", "world");
        assert_eq!(g.relation(&en, &en), VariantRelation::Same);
        assert_eq!(g.relation(&en, &point("en_US", "world")), VariantRelation::Specialization);
        assert_eq!(g.relation(&point("en_US", "world"), &en), VariantRelation::Generalization);
        assert_eq!(g.relation(&en, &point("de", "world")), VariantRelation::Peer);
    }
}
