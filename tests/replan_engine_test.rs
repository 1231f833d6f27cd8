// ==========================================
// 重排引擎集成测试
// ==========================================
// 测试范围:
// 1. 挤占: 高优先级补齐时低优先级单元格后移并落库
// 2. 跳过: 高优先级单元格不被挤占, 补齐越过
// 3. 配置: 工作时段 / 窗口天数 / 挤占链上限 由 config_kv 覆写
// 4. 跨产线: 其他产线已排工时从补齐需求中扣除
// ==========================================

mod test_helpers;

use line_planning_aps::config::config_keys;
use line_planning_aps::ConflictKind;
use serde_json::json;
use test_helpers::*;

const HIGH: &str = "d0000000-0000-4000-8000-000000000001";
const LOW: &str = "d0000000-0000-4000-8000-000000000002";
const MID: &str = "d0000000-0000-4000-8000-000000000003";

fn save(env: &TestEnv, order: &str, day: u32, hour: u8) -> line_planning_aps::engine::SaveCellOutcome {
    save_on(env, LINE_A, order, day, hour)
}

fn save_on(
    env: &TestEnv,
    line: &str,
    order: &str,
    day: u32,
    hour: u8,
) -> line_planning_aps::engine::SaveCellOutcome {
    env.state
        .planning_api
        .save_cell(&json!({
            "order_uuid": order,
            "lasworkline_uuid": line,
            "date": format!("2026-03-{:02}", day),
            "hour": hour,
            "minute": 0,
            "zoom_level": "hour",
            "workers": 1,
        }))
        .expect("保存失败")
}

#[test]
fn test_高优先级补齐挤占低优先级() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(LOW).quantity(2).priority(1).insert(&env); // 2h
    OrderSeed::new(HIGH).quantity(2).priority(5).insert(&env); // 2h

    save(&env, LOW, 2, 8); // LOW: 08:00, 09:00
    let outcome = save(&env, HIGH, 2, 8); // 覆盖 08:00, 补齐 09:00

    let result = &outcome.replan_result;
    assert_eq!(result.allocated_units, 8);
    assert!(!result.partial);
    assert_eq!(result.removed.len(), 1);
    assert_eq!(result.removed[0].order_uuid, LOW);
    assert_eq!(result.moved.len(), 1);
    assert_eq!(result.moved[0].from, "2026-03-02 09:00");
    assert_eq!(result.moved[0].to, "2026-03-02 10:00");

    let day = date(2026, 3, 2);
    assert_eq!(env.order_slots(HIGH, LINE_A, day), vec![(8, 0), (9, 0)]);
    assert_eq!(env.order_slots(LOW, LINE_A, day), vec![(10, 0)]);

    // 被移动的单元格保留原 UUID
    let moved_id: String = env
        .conn
        .lock()
        .unwrap()
        .query_row(
            "SELECT planning_uuid FROM planning_cell WHERE order_uuid = ?1",
            [LOW],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(moved_id, result.moved[0].planning_uuid);
}

#[test]
fn test_低优先级补齐越过高优先级() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(HIGH).quantity(1).priority(5).insert(&env);
    OrderSeed::new(LOW).quantity(3).priority(1).insert(&env);

    save(&env, HIGH, 2, 9);
    let outcome = save(&env, LOW, 2, 8);

    assert!(outcome.replan_result.moved.is_empty());
    let day = date(2026, 3, 2);
    assert_eq!(env.order_slots(HIGH, LINE_A, day), vec![(9, 0)]);
    assert_eq!(env.order_slots(LOW, LINE_A, day), vec![(8, 0), (10, 0), (11, 0)]);
}

#[test]
fn test_同优先级先创建者优先() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(HIGH)
        .quantity(1)
        .priority(3)
        .created_at("2026-01-01 08:00:00")
        .insert(&env);
    OrderSeed::new(LOW)
        .quantity(2)
        .priority(3)
        .created_at("2026-02-01 08:00:00")
        .insert(&env);

    save(&env, HIGH, 2, 9);
    save(&env, LOW, 2, 8);

    let day = date(2026, 3, 2);
    assert_eq!(env.order_slots(HIGH, LINE_A, day), vec![(9, 0)]);
    assert_eq!(env.order_slots(LOW, LINE_A, day), vec![(8, 0), (10, 0)]);
}

#[test]
fn test_工作时段与跨日补齐() {
    let env = create_test_env().unwrap();
    let config = &env.state.config_manager;
    config.set_global_config_value(config_keys::WORK_DAY_START_HOUR, "8").unwrap();
    config.set_global_config_value(config_keys::WORK_DAY_END_HOUR, "10").unwrap();

    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(LOW).quantity(3).insert(&env);

    let outcome = save(&env, LOW, 2, 9);
    assert!(!outcome.replan_result.partial);
    assert_eq!(env.order_slots(LOW, LINE_A, date(2026, 3, 2)), vec![(9, 0)]);
    assert_eq!(env.order_slots(LOW, LINE_A, date(2026, 3, 3)), vec![(8, 0), (9, 0)]);
}

#[test]
fn test_窗口耗尽返回部分结果() {
    let env = create_test_env().unwrap();
    let config = &env.state.config_manager;
    config.set_global_config_value(config_keys::WORK_DAY_START_HOUR, "8").unwrap();
    config.set_global_config_value(config_keys::WORK_DAY_END_HOUR, "10").unwrap();
    config.set_global_config_value(config_keys::REPLAN_HORIZON_DAYS, "1").unwrap();

    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(LOW).quantity(5).insert(&env);

    let outcome = save(&env, LOW, 2, 8);
    let result = &outcome.replan_result;
    assert!(result.partial);
    assert_eq!(result.required_units, 20);
    assert_eq!(result.allocated_units, 8);
    assert!(result
        .conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::HorizonExhausted));
    assert_eq!(env.count_cells(LINE_A, date(2026, 3, 3)), 0);
}

#[test]
fn test_挤占链超限回滚() {
    let env = create_test_env().unwrap();
    let config = &env.state.config_manager;
    config.set_global_config_value(config_keys::WORK_DAY_START_HOUR, "8").unwrap();
    config.set_global_config_value(config_keys::WORK_DAY_END_HOUR, "12").unwrap();
    config.set_global_config_value(config_keys::REPLAN_MAX_CHAIN, "1").unwrap();

    insert_work_line(&env, LINE_A, Some(5));
    OrderSeed::new(HIGH).quantity(2).priority(9).insert(&env);
    OrderSeed::new(MID).quantity(1).priority(5).insert(&env);
    OrderSeed::new(LOW).quantity(1).priority(1).insert(&env);

    save(&env, MID, 2, 9);
    save(&env, LOW, 2, 10);

    // HIGH 补齐 09:00 需要 MID → 10:00, 进而 LOW → 11:00, 链长 2 超限
    let outcome = save(&env, HIGH, 2, 8);
    let result = &outcome.replan_result;
    assert!(result.partial);
    assert!(result.moved.is_empty());
    let conflict = result
        .conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::ChainLimitExceeded)
        .expect("应报告挤占链超限");
    assert_eq!(conflict.slot.as_deref(), Some("2026-03-02 09:00"));

    let day = date(2026, 3, 2);
    assert_eq!(env.order_slots(HIGH, LINE_A, day), vec![(8, 0)]);
    assert_eq!(env.order_slots(MID, LINE_A, day), vec![(9, 0)]);
    assert_eq!(env.order_slots(LOW, LINE_A, day), vec![(10, 0)]);
}

#[test]
fn test_其他产线已排工时不重复补齐() {
    let env = create_test_env().unwrap();
    insert_work_line(&env, LINE_A, Some(5));
    insert_work_line(&env, LINE_B, Some(5));
    OrderSeed::new(MID).quantity(4).insert(&env); // 4h = 16 刻钟

    let first = save_on(&env, LINE_A, MID, 2, 8);
    assert_eq!(first.replan_result.required_units, 16);
    assert_eq!(first.replan_result.allocated_units, 16);

    // A 已排满需求, B 上只保留手工保存的单元格
    let second = save_on(&env, LINE_B, MID, 2, 8);
    let result = &second.replan_result;
    assert_eq!(result.required_units, 0);
    assert_eq!(result.allocated_units, 4);
    assert!(!result.partial);

    let day = date(2026, 3, 2);
    assert_eq!(env.order_slots(MID, LINE_A, day), vec![(8, 0), (9, 0), (10, 0), (11, 0)]);
    assert_eq!(env.order_slots(MID, LINE_B, day), vec![(8, 0)]);

    // A 部分排产时, B 只补齐剩余差额
    env.execute("DELETE FROM planning_cell WHERE line_uuid = ?1", &[&LINE_B]);
    env.execute(
        "DELETE FROM planning_cell WHERE line_uuid = ?1 AND hour >= 10",
        &[&LINE_A],
    );
    let third = save_on(&env, LINE_B, MID, 2, 14);
    assert_eq!(third.replan_result.required_units, 8);
    assert_eq!(third.replan_result.allocated_units, 8);
    assert_eq!(env.order_slots(MID, LINE_B, day), vec![(14, 0), (15, 0)]);
}
