//! Level 2 - Tasks integration tests.
//!
//! Collection deltas over referenced lists, self-referencing subtasks and a
//! workflow with a side effect.
//!
//! Test modules:
//! - deltas: add, update and delete children through the parent
//! - subtasks: self-referencing lists
//! - workflow: side effects commit with the transition, and only then

use morph_tests::prelude::*;

mod deltas {
    use super::*;

    pub fn scenario() -> Scenario {
        Scenario::new("tasks_deltas", fixtures::tasks)
            .step("test_setup_alpha", "addproject", json!({ "input": { "name": "Alpha" } }), |a| a.ok())
            .bind("alpha")
            .step("test_setup_beta", "addproject", json!({ "input": { "name": "Beta" } }), |a| a.ok())
            .bind("beta")
            .step(
                "test_setup_t1",
                "addtask",
                json!({ "input": { "title": "write", "project": { "id": "$alpha" } } }),
                |a| a.field("state", "TODO"),
            )
            .bind("t1")
            .step(
                "test_setup_t2",
                "addtask",
                json!({ "input": { "title": "review", "project": { "id": "$alpha" } } }),
                |a| a.ok(),
            )
            .bind("t2")
            // Added children get the parent link, updated ones keep it
            .step(
                "test_add_and_update_through_parent",
                "updateproject",
                json!({ "input": {
                    "id": "$alpha",
                    "tasks": {
                        "added": [{ "title": "ship" }],
                        "updated": [{ "id": "$t1", "title": "write docs" }]
                    }
                } }),
                |a| a.field("name", "Alpha"),
            )
            .step(
                "test_alpha_tasks",
                "tasks",
                json!({
                    "project": { "terms": [{ "path": "name", "value": "Alpha" }] },
                    "sort": { "terms": [{ "field": "title" }] }
                }),
                |a| a.column("title", ["review", "ship", "write docs"]),
            )
            // A parent may not delete another parent's child
            .step(
                "test_delete_foreign_child",
                "updateproject",
                json!({ "input": { "id": "$beta", "tasks": { "deleted": ["$t2"] } } }),
                |a| a.status(400).error("does not belong"),
            )
            .step("test_foreign_child_survives", "task", json!({ "id": "$t2" }), |a| a.field("title", "review"))
            .step(
                "test_delete_own_child",
                "updateproject",
                json!({ "input": { "id": "$alpha", "tasks": { "deleted": ["$t2"] } } }),
                |a| a.ok(),
            )
            .step("test_child_deleted", "task", json!({ "id": "$t2" }), |a| a.is_null())
            .step(
                "test_delta_rejects_unknown_keys",
                "updateproject",
                json!({ "input": { "id": "$alpha", "tasks": { "moved": [] } } }),
                |a| a.status(400).error("ProjectInputForUpdate.tasks.moved"),
            )
    }

    #[tokio::test]
    async fn test_collection_deltas_through_parent() {
        let outcome = scenario().run().await.unwrap();

        assert_eq!(outcome.store.count("projects"), 2);
        assert_eq!(outcome.store.count("tasks"), 2);
    }
}

mod subtasks {
    use super::*;

    pub fn scenario() -> Scenario {
        Scenario::new("tasks_subtasks", fixtures::tasks)
            .step(
                "test_add_with_subtasks",
                "addtask",
                json!({ "input": {
                    "title": "release",
                    "subtasks": { "added": [{ "title": "tag" }, { "title": "publish" }] }
                } }),
                |a| a.field("title", "release"),
            )
            .bind("release")
            // Referenced lists join children on their link back to the parent
            .step(
                "test_find_parent_by_subtask",
                "tasks",
                json!({ "subtasks": { "terms": [{ "path": "title", "value": "tag" }] } }),
                |a| a.rows(1).column("title", ["release"]),
            )
            .step("test_everything_starts_todo", "tasks", json!({ "state": { "value": "TODO" } }), |a| a.rows(3))
    }

    #[tokio::test]
    async fn test_self_referencing_collection() {
        let outcome = scenario().run().await.unwrap();

        assert_eq!(outcome.store.count("tasks"), 3);
    }
}

mod workflow {
    use super::*;

    pub fn scenario() -> Scenario {
        Scenario::new("tasks_workflow", fixtures::tasks)
            .step("test_setup_task", "addtask", json!({ "input": { "title": "plan", "due": "2024-05-01" } }), |a| {
                a.field("due", "2024-05-01T00:00:00.000Z")
            })
            .bind("plan")
            .step("test_finish_before_start", "finish_task", json!({ "input": { "id": "$plan" } }), |a| {
                a.error("Action is not allowed from state TODO")
            })
            .step("test_no_activity_yet", "activities", json!({}), |a| a.rows(0))
            .step("test_start", "start_task", json!({ "input": { "id": "$plan" } }), |a| a.field("state", "DOING"))
            .step("test_finish", "finish_task", json!({ "input": { "id": "$plan" } }), |a| a.field("state", "DONE"))
            .step("test_activity_recorded", "activities", json!({}), |a| {
                a.rows(1).column("action", ["finish"])
            })
    }

    #[tokio::test]
    async fn test_side_effect_commits_with_transition() {
        let outcome = scenario().run().await.unwrap();

        assert_eq!(outcome.store.count("activity"), 1);
    }
}
