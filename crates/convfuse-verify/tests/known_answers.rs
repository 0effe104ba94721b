use convfuse::{DType, ExecutionContext};
use convfuse_verify::matrix::known_answers;
use convfuse_verify::{compare, CpuFusedInvoker, FusedInvoker, ReferenceGraph, Tolerance};

#[test]
fn hand_computed_cases_are_exact_on_both_sides() {
    convfuse_verify::init_tracing();
    let invoker = CpuFusedInvoker::standalone(ExecutionContext::new());
    let answers = known_answers().unwrap();
    assert_eq!(answers.len(), 2 * 3 * DType::ALL.len());

    for answer in &answers {
        let summary = answer.config.summary();
        let reference = ReferenceGraph::from_config(&answer.config)
            .unwrap()
            .execute(&answer.inputs)
            .unwrap();
        let result = compare(&answer.expected, &reference, Tolerance::exact());
        assert!(result.equal, "reference {summary}: {:?}", result.first_mismatch);

        let fused = invoker.invoke(&answer.config, &answer.inputs).unwrap();
        let result = compare(&answer.expected, &fused, Tolerance::exact());
        assert!(result.equal, "fused {summary}: {:?}", result.first_mismatch);
        assert_eq!(result.max_abs_diff, 0.0);
    }
}

#[test]
fn same_padding_case_matches_documented_output() {
    let answer = known_answers()
        .unwrap()
        .into_iter()
        .find(|a| a.config.name == "pad/handwritten_same" && a.config.dtype == DType::F32)
        .unwrap();
    assert_eq!(answer.expected.dims(), &[1, 3, 4, 1]);
    assert_eq!(
        answer.expected.to_f64_vec(),
        vec![105., 150., 183., 95., 235., 312., 357., 178., 187., 234., 261., 121.]
    );
}

#[test]
fn anisotropic_stride_case_shrinks_width() {
    let answer = known_answers()
        .unwrap()
        .into_iter()
        .find(|a| {
            a.config.name == "resize_pad/anisotropic_stride_valid" && a.config.dtype == DType::F64
        })
        .unwrap();
    assert_eq!(answer.config.stride, [1, 3]);
    assert_eq!(answer.expected.dims(), &[1, 2, 2, 1]);
    assert_eq!(answer.expected.to_f64_vec(), vec![31., -23., 41., -33.]);
}
