#[test]
fn shutdown_flag_can_toggle() {
    assert!(!llmfanout_service::shutdown_requested());
    llmfanout_service::request_shutdown();
    assert!(llmfanout_service::shutdown_requested());
    llmfanout_service::clear_shutdown_flag();
    assert!(!llmfanout_service::shutdown_requested());
}
