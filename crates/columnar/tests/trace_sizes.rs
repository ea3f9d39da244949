//! Size report of a generated typing trace.

use columnar::{encode_trace, ColumnarError, EncoderOptions, Trace};

/// One node typing `n` chars in sequence, deleting every fifth.
fn typing_trace(n: u64) -> String {
    let mut ops = Vec::new();
    let mut counter = 0;
    let mut last: Option<u64> = None;
    for i in 0..n {
        counter += 1;
        let reference = match last {
            Some(c) => format!("\"{c}-1\""),
            None => "null".to_owned(),
        };
        ops.push(format!(r#"{{"op": "insert", "id": "{counter}-1", "ref": {reference}, "val": "a"}}"#));
        last = Some(counter);
        if i % 5 == 4 {
            counter += 1;
            ops.push(format!(r#"{{"op": "delete", "id": "{counter}-1", "ref": "{}-1"}}"#, counter - 1));
        }
    }
    format!(r#"{{"messages": [{{"node": 1, "ops": [{}]}}]}}"#, ops.join(","))
}

#[test]
fn sequential_typing_compresses() {
    let trace = Trace::from_json_str(&typing_trace(1000)).unwrap();
    let columns = encode_trace(&trace, &EncoderOptions::default()).unwrap();
    assert_eq!(columns.ops, 1200);
    let sizes = columns.sizes();
    assert_eq!(sizes.get("insertedStrings"), Some(1000));
    // All from node 1: a single run.
    assert_eq!(sizes.get("originNodes"), Some(3));
    // Counters advance by one per op.
    assert_eq!(sizes.get("opIdCounters"), Some(3));
    assert!(sizes.total() < 1200 * 4);
    assert_eq!(sizes.total(), sizes.columns.iter().map(|c| c.bytes).sum::<usize>());
}

#[test]
fn foreign_op_id_is_rejected() {
    let json = r#"{"messages": [{"node": 7, "ops": [{"op": "insert", "id": "1-8", "ref": null, "val": "a"}]}]}"#;
    let err = encode_trace(&Trace::from_json_str(json).unwrap(), &EncoderOptions::default()).unwrap_err();
    assert!(matches!(err, ColumnarError::BadOpId(id) if id == "1-8"));
}

#[test]
fn invalid_json() {
    assert!(matches!(Trace::from_json_str("{\"messages\": 3}"), Err(ColumnarError::Json(_))));
}
