//! Skin weight ordering and normalisation

use super::{Geom, Vertex, Weight};

impl Vertex {
    /// Sort weights from heaviest to lightest
    pub fn sort_weights(&mut self) {
        self.weights_mut()
            .sort_by(|a, b| b.weight.total_cmp(&a.weight));
    }

    /// Scale weights so they sum to one
    ///
    /// A vertex whose weights sum to zero puts everything on its first weight.
    pub fn normalize_weights(&mut self) {
        let total: f32 = self.weights().iter().map(|w| w.weight).sum();
        let weights = self.weights_mut();
        if total > 0.0 {
            for w in weights.iter_mut() {
                w.weight /= total;
            }
        } else if let Some((first, rest)) = weights.split_first_mut() {
            first.weight = 1.0;
            for w in rest {
                w.weight = 0.0;
            }
        }
    }
}

impl Geom {
    /// Sort, cap and renormalise the skin weights of every vertex
    ///
    /// Vertices keep at most `max_weights` weights. Weights lighter than
    /// `min_weight` are dropped, always keeping the heaviest one. A vertex
    /// without weights is bound fully to bone 0.
    pub fn clean_weights(&mut self, max_weights: usize, min_weight: f32) {
        let max_weights = max_weights.max(1);
        let mut rebound = 0;

        for vertex in &mut self.vertices {
            vertex.sort_weights();

            if vertex.weight_count == 0 {
                vertex.weights[0] = Weight::new(0, 1.0);
                vertex.weight_count = 1;
                rebound += 1;
                continue;
            }

            if vertex.weight_count > max_weights {
                vertex.weight_count = max_weights;
            }

            let kept = vertex
                .weights()
                .iter()
                .take_while(|w| w.weight >= min_weight)
                .count();
            vertex.weight_count = kept.max(1);
            vertex.normalize_weights();
        }

        if rebound > 0 {
            log::debug!("Bound {} unweighted vertices to bone 0", rebound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn vertex_with(weights: &[(usize, f32)]) -> Vertex {
        let mut vertex = Vertex::default();
        for &(bone, weight) in weights {
            vertex.push_weight(bone, weight).unwrap();
        }
        vertex
    }

    fn assert_normalized(vertex: &Vertex) {
        let total: f32 = vertex.weights().iter().map(|w| w.weight).sum();
        assert!((total - 1.0).abs() < 1e-5, "sum {}", total);
        assert!(vertex.weights().windows(2).all(|w| w[0].weight >= w[1].weight));
    }

    #[test_case(&[(3, 0.2), (1, 0.5), (2, 0.3)], 4, 0.0, &[1, 2, 3] ; "sorted only")]
    #[test_case(&[(3, 0.2), (1, 0.5), (2, 0.3)], 2, 0.0, &[1, 2] ; "capped")]
    #[test_case(&[(3, 0.05), (1, 0.9), (2, 0.05)], 4, 0.1, &[1] ; "light weights dropped")]
    #[test_case(&[(3, 0.01), (1, 0.02)], 4, 0.5, &[1] ; "heaviest kept")]
    #[test_case(&[], 4, 0.1, &[0] ; "unweighted bound to root")]
    fn test_clean_weights(weights: &[(usize, f32)], max: usize, min: f32, bones: &[usize]) {
        let mut geom = Geom::default();
        geom.vertices.push(vertex_with(weights));

        geom.clean_weights(max, min);

        let vertex = &geom.vertices[0];
        let kept: Vec<_> = vertex.weights().iter().map(|w| w.bone).collect();
        assert_eq!(kept, bones);
        assert_normalized(vertex);
    }

    #[test]
    fn test_zero_weights_normalize_to_first() {
        let mut vertex = vertex_with(&[(4, 0.0), (5, 0.0)]);
        vertex.normalize_weights();
        assert_eq!(vertex.weights()[0], Weight::new(4, 1.0));
        assert_eq!(vertex.weights()[1].weight, 0.0);
    }
}
