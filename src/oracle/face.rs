use async_trait::async_trait;
use sqlx::MySqlPool;

use super::{FaceEnrollment, FaceMatch, FaceValidator};
use crate::engine::error::EngineResult;
use crate::store::mysql::map_sqlx_error;

/// Euclidean distance matcher over face descriptors; lower is closer.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorMatcher {
    pub threshold: f64,
}

impl DescriptorMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl FaceValidator for DescriptorMatcher {
    fn check(&self, observed: &[f32], enrolled: &[f32]) -> FaceMatch {
        if observed.is_empty() || observed.len() != enrolled.len() {
            return FaceMatch {
                matched: false,
                score: f64::INFINITY,
            };
        }
        let score = observed
            .iter()
            .zip(enrolled)
            .map(|(a, b)| {
                let diff = f64::from(*a) - f64::from(*b);
                diff * diff
            })
            .sum::<f64>()
            .sqrt();
        FaceMatch {
            matched: score < self.threshold,
            score,
        }
    }
}

/// Reads the enrolled descriptor stored as a JSON array on the user row.
#[derive(Clone)]
pub struct MySqlFaceEnrollment {
    pool: MySqlPool,
}

impl MySqlFaceEnrollment {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FaceEnrollment for MySqlFaceEnrollment {
    async fn enrolled_descriptor(&self, user_id: u64) -> EngineResult<Option<Vec<f32>>> {
        let raw = sqlx::query_scalar::<_, Option<String>>(
            "SELECT face_descriptor FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .flatten();

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<Vec<f32>>(&raw) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Stored face descriptor is not a number array");
                Ok(None)
            }
        }
    }
}
