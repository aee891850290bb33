use crate::types::Metric;
use hnsw::Hnsw;
use rand_pcg::Pcg64;
use space::{Metric as SpaceMetric, Neighbor};

const EPSILON: f32 = 1e-6;

pub fn cosine_distance(dot: f32, na: f32, nb: f32) -> f32 {
    let cos = if na < EPSILON || nb < EPSILON {
        0.0
    } else {
        dot / (na * nb)
    };
    (1.0 - cos).max(0.0)
}

pub fn euclidean_distance(dot: f32, na: f32, nb: f32) -> f32 {
    (na * na + nb * nb - 2.0 * dot).max(0.0).sqrt()
}

impl Metric {
    /// Distance from the dot product and the two norms.
    pub fn distance(self, dot: f32, na: f32, nb: f32) -> f32 {
        match self {
            Metric::Cosine => cosine_distance(dot, na, nb),
            Metric::Euclidean => euclidean_distance(dot, na, nb),
        }
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[derive(Clone, Copy)]
pub struct CosineMetric;

impl SpaceMetric<Vec<f32>> for CosineMetric {
    type Unit = u32;
    fn distance(&self, a: &Vec<f32>, b: &Vec<f32>) -> Self::Unit {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        cosine_distance(dot, norm(a), norm(b)).to_bits()
    }
}

#[derive(Clone, Copy)]
pub struct EuclideanMetric;

impl SpaceMetric<Vec<f32>> for EuclideanMetric {
    type Unit = u32;
    fn distance(&self, a: &Vec<f32>, b: &Vec<f32>) -> Self::Unit {
        let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
        sum.sqrt().to_bits()
    }
}

pub const M: usize = 12;
pub const M0: usize = 24;

/// HNSW graph over dense rows, built once at load.
pub enum Graph {
    Cosine(Hnsw<CosineMetric, Vec<f32>, Pcg64, M, M0>),
    Euclidean(Hnsw<EuclideanMetric, Vec<f32>, Pcg64, M, M0>),
}

impl Graph {
    pub fn build(metric: Metric, rows: &[Vec<f32>]) -> Self {
        let mut searcher = hnsw::Searcher::default();
        let mut graph = match metric {
            Metric::Cosine => Graph::Cosine(Hnsw::new(CosineMetric)),
            Metric::Euclidean => Graph::Euclidean(Hnsw::new(EuclideanMetric)),
        };
        for row in rows {
            match &mut graph {
                Graph::Cosine(h) => h.insert(row.clone(), &mut searcher),
                Graph::Euclidean(h) => h.insert(row.clone(), &mut searcher),
            };
        }
        graph
    }

    /// Approximate neighbors as `(position, distance)`, unordered.
    pub fn nearest(&self, query: &Vec<f32>, k: usize, ef: usize) -> Vec<(usize, f32)> {
        let mut searcher = hnsw::Searcher::default();
        let mut neighbors = vec![
            Neighbor {
                index: !0,
                distance: 0
            };
            k
        ];
        let found = match self {
            Graph::Cosine(h) => h.nearest(query, ef.max(k), &mut searcher, &mut neighbors),
            Graph::Euclidean(h) => h.nearest(query, ef.max(k), &mut searcher, &mut neighbors),
        };
        found
            .iter()
            .map(|n| (n.index, f32::from_bits(n.distance)))
            .collect()
    }
}
