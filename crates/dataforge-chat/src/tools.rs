//! Progress lines rendered into the answer while server-side tools run.

/// Human-readable names for the backend's data tools
const TOOL_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("query_call_records", "查询通话记录"),
    ("get_call_statistics", "统计通话数据"),
    ("query_call_analysis", "分析通话内容"),
    ("query_accounts", "查询账号信息"),
    ("query_sync_tasks", "查询同步任务"),
    ("query_task_logs", "查询任务日志"),
    ("query_articles", "查询文章"),
    ("query_templates", "查询模板"),
];

/// Line appended when a tool succeeds
pub const TOOL_SUCCESS_LINE: &str = "✅ 数据查询完成\n\n";

/// Display name for a tool, or the raw identifier if unknown
pub fn display_name(tool_name: &str) -> &str {
    TOOL_DISPLAY_NAMES
        .iter()
        .find(|(id, _)| *id == tool_name)
        .map(|(_, name)| *name)
        .unwrap_or(tool_name)
}

/// Line appended when a tool starts
pub fn progress_line(tool_name: &str) -> String {
    format!("\n🔍 正在{}...\n", display_name(tool_name))
}
