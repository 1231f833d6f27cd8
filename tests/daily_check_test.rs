// ==========================================
// 日检引擎集成测试
// ==========================================
// 测试范围:
// 1. 完工订单: 删除当日尚未开始的单元格, 已开始的保留
// 2. 停用订单: 同上
// 3. 有剩余量但当日未排产: 仅报告
// 4. 订单被删除: 按停用处理（REMOVED_INACTIVE）
// 5. 订单读取失败: LOOKUP_FAILED; 删除失败: REMOVE_FAILED; 均不删除
// 6. 幂等: 第二次运行 orders_modified = 0
// ==========================================

mod test_helpers;

use line_planning_aps::engine::{CheckDetail, DailyCheckReport};
use line_planning_aps::CheckAction;
use serde_json::json;
use test_helpers::*;

const DONE: &str = "e0000000-0000-4000-8000-000000000001";
const CANCELLED: &str = "e0000000-0000-4000-8000-000000000002";
const IDLE: &str = "e0000000-0000-4000-8000-000000000003";
const RUNNING: &str = "e0000000-0000-4000-8000-000000000004";
const GONE: &str = "e0000000-0000-4000-8000-000000000005";
const BROKEN: &str = "e0000000-0000-4000-8000-000000000006";

fn save(env: &TestEnv, order: &str, line: &str, hour: u8) {
    env.state
        .planning_api
        .save_cell(&json!({
            "order_uuid": order,
            "lasworkline_uuid": line,
            "date": "2026-03-02",
            "hour": hour,
            "minute": 0,
            "zoom_level": "hour",
            "workers": 1,
        }))
        .expect("保存失败");
}

fn detail<'a>(report: &'a DailyCheckReport, order: &str) -> &'a CheckDetail {
    report
        .details
        .iter()
        .find(|d| d.order_uuid == order)
        .unwrap_or_else(|| panic!("报告中缺少订单 {}", order))
}

#[test]
fn test_完工订单删除后续单元格且幂等() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(DONE).quantity(3).insert(&env);
    save(&env, DONE, LINE_A, 8); // 08:00, 09:00, 10:00

    set_worked_quantity(&env, DONE, 3);

    let day = date(2026, 3, 2);
    let now = datetime(2026, 3, 2, 8, 30);
    let report = env.state.checker.run_for(day, now).unwrap();

    let d = detail(&report, DONE);
    assert_eq!(d.action, CheckAction::RemovedCompleted);
    assert_eq!(d.removed_cells, 2);
    assert_eq!(report.orders_modified, 1);
    assert_eq!(env.order_slots(DONE, LINE_A, day), vec![(8, 0)]);

    let again = env.state.checker.run_for(day, now).unwrap();
    assert_eq!(again.orders_modified, 0);
    assert_eq!(detail(&again, DONE).action, CheckAction::NoChange);
    assert_eq!(env.order_slots(DONE, LINE_A, day), vec![(8, 0)]);
}

#[test]
fn test_停用订单跨产线删除() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    insert_work_line(&env, LINE_B, Some(5));
    OrderSeed::new(CANCELLED).quantity(1).insert(&env);
    save(&env, CANCELLED, LINE_A, 14);
    save(&env, CANCELLED, LINE_B, 15);

    deactivate_order(&env, CANCELLED);

    let day = date(2026, 3, 2);
    let report = env
        .state
        .checker
        .run_for(day, datetime(2026, 3, 2, 12, 0))
        .unwrap();

    let d = detail(&report, CANCELLED);
    assert_eq!(d.action, CheckAction::RemovedInactive);
    assert_eq!(d.removed_cells, 2);
    assert_eq!(env.count_cells(LINE_A, day), 0);
    assert_eq!(env.count_cells(LINE_B, day), 0);
}

#[test]
fn test_未排产仅报告() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(IDLE).quantity(4).worked(1).insert(&env);
    OrderSeed::new(RUNNING).quantity(2).insert(&env);
    save(&env, RUNNING, LINE_A, 8);

    let report = env
        .state
        .checker
        .run_for(date(2026, 3, 2), datetime(2026, 3, 2, 6, 0))
        .unwrap();

    assert_eq!(report.orders_checked, 2);
    assert_eq!(report.orders_modified, 0);
    assert_eq!(detail(&report, IDLE).action, CheckAction::Unplanned);
    assert_eq!(detail(&report, RUNNING).action, CheckAction::NoChange);
    assert_eq!(env.count_cells(LINE_A, date(2026, 3, 2)), 2);
}

#[test]
fn test_订单被删除按停用删除后续排产() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(GONE).quantity(1).insert(&env);
    save(&env, GONE, LINE_A, 9);

    env.execute("UPDATE orders SET is_deleted = 1 WHERE order_uuid = ?1", &[&GONE]);

    let day = date(2026, 3, 2);
    let now = datetime(2026, 3, 2, 6, 0);
    let report = env.state.checker.run_for(day, now).unwrap();

    let d = detail(&report, GONE);
    assert_eq!(d.action, CheckAction::RemovedInactive);
    assert_eq!(d.removed_cells, 1);
    assert_eq!(report.orders_modified, 1);
    assert_eq!(env.count_cells(LINE_A, day), 0);

    // 单元格已清空, 订单不再进入检查范围
    let again = env.state.checker.run_for(day, now).unwrap();
    assert_eq!(again.orders_checked, 0);
}

#[test]
fn test_订单读取失败记录且不删除() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(BROKEN).quantity(1).insert(&env);
    save(&env, BROKEN, LINE_A, 9);

    // 停用且创建时间损坏: 不进入启用列表, 单独读取时解析失败
    env.execute(
        "UPDATE orders SET active = 0, created_at = 'not-a-time' WHERE order_uuid = ?1",
        &[&BROKEN],
    );

    let report = env
        .state
        .checker
        .run_for(date(2026, 3, 2), datetime(2026, 3, 2, 6, 0))
        .unwrap();

    assert_eq!(detail(&report, BROKEN).action, CheckAction::LookupFailed);
    assert_eq!(report.orders_modified, 0);
    assert_eq!(env.count_cells(LINE_A, date(2026, 3, 2)), 1);
}

#[test]
fn test_删除失败记录为删除失败() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(DONE).quantity(2).insert(&env);
    save(&env, DONE, LINE_A, 8);
    set_worked_quantity(&env, DONE, 2);

    env.execute(
        "CREATE TRIGGER block_cell_delete BEFORE DELETE ON planning_cell \
         BEGIN SELECT RAISE(ABORT, 'planning_cell is read-only'); END",
        &[],
    );

    let day = date(2026, 3, 2);
    let report = env
        .state
        .checker
        .run_for(day, datetime(2026, 3, 2, 6, 0))
        .unwrap();

    let d = detail(&report, DONE);
    assert_eq!(d.action, CheckAction::RemoveFailed);
    assert_eq!(d.removed_cells, 0);
    assert!(d.message.contains("read-only"));
    assert_eq!(report.orders_modified, 0);
    assert_eq!(env.order_slots(DONE, LINE_A, day), vec![(8, 0), (9, 0)]);
}

#[test]
fn test_过去日期不删除() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(DONE).quantity(1).insert(&env);
    save(&env, DONE, LINE_A, 9);
    set_worked_quantity(&env, DONE, 1);

    let report = env
        .state
        .checker
        .run_for(date(2026, 3, 2), datetime(2026, 3, 3, 6, 0))
        .unwrap();

    assert_eq!(detail(&report, DONE).action, CheckAction::NoChange);
    assert_eq!(env.count_cells(LINE_A, date(2026, 3, 2)), 1);
}

#[test]
fn test_api_日检响应() {
    let env = create_test_env().unwrap();
    let resp = env.state.planning_api.daily_check().unwrap();
    assert_eq!(resp.report.orders_checked, 0);
    assert!(resp.message.contains("日检完成"));
}
