use crate::model::{Detection, Summary};

/// Count detections by category, condition, and class, in one pass.
pub fn summarize(detections: &[Detection]) -> Summary {
    let mut summary = Summary {
        total: detections.len(),
        ..Summary::default()
    };

    for detection in detections {
        *summary
            .by_category
            .entry(detection.category.clone())
            .or_insert(0) += 1;
        summary.by_condition.increment(detection.condition);

        summary
            .by_class
            .entry(detection.class_name.clone())
            .or_default()
            .increment(detection.condition);
    }

    summary
}
