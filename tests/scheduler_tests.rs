
use std::sync::Arc;
use std::time::Duration;

use galley::ledger::{OrderEvent, OrderStatus};
use galley::scheduler::{Stage, WorkItem};
use galley::store::Recipe;
use galley::workforce::{Role, WorkforceDirectory};
use galley::GalleyError;
use test_harness::{burger_menu, test_config, worker, TestKitchen, BUN, PATTY};

fn one_chef_one_waiter() -> Vec<galley::workforce::WorkerProfile> {
    vec![worker(1, Role::Chef, 1.0), worker(2, Role::Waiter, 1.0)]
}

#[tokio::test]
async fn test_submit_deducts_and_estimates() {
    let tk = TestKitchen::new(test_config(), burger_menu(5.0, 5.0, one_chef_one_waiter()));

    let receipt = tk.kitchen.submit_order("Burger", 3).await.unwrap();

    assert_eq!(receipt.estimated_time, 20.0);
    assert_eq!(receipt.total_cost, 24.0);
    assert_eq!(tk.stock(BUN), 2.0);
    assert_eq!(tk.stock(PATTY), 2.0);
    assert_eq!(tk.kitchen.pending().await, 1);
}

#[tokio::test]
async fn test_insufficient_inventory_changes_nothing() {
    let tk = TestKitchen::new(test_config(), burger_menu(5.0, 2.0, one_chef_one_waiter()));

    let err = tk.kitchen.submit_order("Burger", 3).await.unwrap_err();

    assert!(matches!(err, GalleyError::InsufficientInventory { .. }));
    assert_eq!(tk.stock(BUN), 5.0);
    assert_eq!(tk.stock(PATTY), 2.0);
    assert_eq!(tk.kitchen.pending().await, 0);
    assert!(tk.kitchen.orders().await.is_empty());
}

#[tokio::test]
async fn test_invalid_quantity_rejected() {
    let tk = TestKitchen::new(test_config(), burger_menu(5.0, 5.0, one_chef_one_waiter()));

    for quantity in [0, -1, -100, i64::from(u32::MAX) + 1] {
        let err = tk.kitchen.submit_order("Burger", quantity).await.unwrap_err();
        assert!(
            matches!(err, GalleyError::InvalidQuantity(q) if q == quantity),
            "quantity {} gave {}",
            quantity,
            err
        );
    }
    assert_eq!(tk.stock(BUN), 5.0);
    assert_eq!(tk.stock(PATTY), 5.0);
    assert_eq!(tk.kitchen.pending().await, 0);
}

#[tokio::test]
async fn test_invalid_quantity_message_names_both_bounds() {
    let tk = TestKitchen::new(test_config(), burger_menu(5.0, 5.0, one_chef_one_waiter()));

    let too_big = i64::from(u32::MAX) + 1;
    let msg = tk
        .kitchen
        .submit_order("Burger", too_big)
        .await
        .unwrap_err()
        .to_string();
    assert_eq!(msg, "Invalid quantity: 4294967296 (must be between 1 and 4294967295)");

    let msg = tk.kitchen.submit_order("Burger", 0).await.unwrap_err().to_string();
    assert_eq!(msg, "Invalid quantity: 0 (must be between 1 and 4294967295)");
}

#[tokio::test]
async fn test_unknown_recipe_rejected() {
    let tk = TestKitchen::new(test_config(), burger_menu(5.0, 5.0, one_chef_one_waiter()));

    let err = tk.kitchen.submit_order("Pizza", 1).await.unwrap_err();

    assert!(matches!(err, GalleyError::RecipeNotFound(ref name) if name == "Pizza"));
    assert_eq!(tk.kitchen.pending().await, 0);
}

#[tokio::test]
async fn test_order_ids_are_monotonic() {
    let tk = TestKitchen::new(test_config(), burger_menu(50.0, 50.0, one_chef_one_waiter()));

    let a = tk.kitchen.submit_order("Burger", 1).await.unwrap();
    // Rejected submissions do not disturb ordering.
    let _ = tk.kitchen.submit_order("Burger", 0).await;
    let b = tk.kitchen.submit_order("Fries", 1).await.unwrap();
    let c = tk.kitchen.submit_order("Burger", 2).await.unwrap();

    assert!(a.order_id < b.order_id);
    assert!(b.order_id < c.order_id);
}

#[tokio::test]
async fn test_estimate_uses_least_loaded_chef_performance() {
    let workers = vec![worker(1, Role::Chef, 2.0), worker(2, Role::Waiter, 1.0)];
    let tk = TestKitchen::new(test_config(), burger_menu(5.0, 5.0, workers));

    let receipt = tk.kitchen.submit_order("Burger", 1).await.unwrap();

    assert_eq!(receipt.estimated_time, 10.0);
}

#[tokio::test]
async fn test_estimate_without_chef_assumes_nominal_speed() {
    let workers = vec![worker(2, Role::Waiter, 3.0)];
    let tk = TestKitchen::new(test_config(), burger_menu(5.0, 5.0, workers));

    let receipt = tk.kitchen.submit_order("Burger", 1).await.unwrap();

    assert_eq!(receipt.estimated_time, 20.0);
}

#[test]
fn test_least_loaded_chef() {
    let recipe = Arc::new(Recipe {
        id: 1,
        name: "Burger".to_string(),
        ingredients: Vec::new(),
        complexity: 2.0,
        price: 8.0,
    });
    let mut directory = WorkforceDirectory::from_profiles([
        worker(1, Role::Chef, 1.0),
        worker(2, Role::Chef, 1.0),
        worker(3, Role::Waiter, 1.0),
    ]);
    directory
        .assign(1, WorkItem::new(10, recipe.clone(), 1, 20.0))
        .unwrap();
    for id in 11..14 {
        directory
            .assign(2, WorkItem::new(id, recipe.clone(), 1, 20.0))
            .unwrap();
    }

    let chosen = directory.least_loaded(Stage::Preparation).unwrap();
    assert_eq!(chosen.id(), 1);
    assert_eq!(chosen.load(), 1);
}

#[tokio::test]
async fn test_smaller_estimate_dispatched_first() {
    let mut tk = TestKitchen::new(test_config(), burger_menu(10.0, 10.0, one_chef_one_waiter()));

    let soup = tk.kitchen.submit_order("Soup", 1).await.unwrap();
    let fries_a = tk.kitchen.submit_order("Fries", 1).await.unwrap();
    let burger = tk.kitchen.submit_order("Burger", 1).await.unwrap();
    let fries_b = tk.kitchen.submit_order("Fries", 1).await.unwrap();

    let mut events = tk.kitchen.subscribe();
    tk.start();

    let mut dispatched = Vec::new();
    while dispatched.len() < 4 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("dispatch events should arrive")
            .unwrap();
        if let OrderEvent::Assigned {
            order_id,
            stage: Stage::Preparation,
            ..
        } = event
        {
            dispatched.push(order_id);
        }
    }

    assert_eq!(
        dispatched,
        vec![
            fries_a.order_id,
            fries_b.order_id,
            burger.order_id,
            soup.order_id
        ]
    );
    tk.shutdown().await;
}

#[tokio::test]
async fn test_worker_loads_idempotent() {
    let tk = TestKitchen::new(test_config(), burger_menu(5.0, 5.0, one_chef_one_waiter()));
    tk.kitchen.submit_order("Burger", 1).await.unwrap();

    let first = tk.kitchen.worker_loads().await;
    let second = tk.kitchen.worker_loads().await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].worker_id, 1);
    assert_eq!(first[0].role, Role::Chef);
    assert_eq!(first[1].worker_id, 2);
    assert_eq!(first[1].role, Role::Waiter);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_never_oversell() {
    let tk = TestKitchen::new(test_config(), burger_menu(10.0, 10.0, one_chef_one_waiter()));

    let mut handles = Vec::new();
    for _ in 0..25 {
        let kitchen = tk.kitchen.clone();
        handles.push(tokio::spawn(async move {
            kitchen.submit_order("Burger", 1).await
        }));
    }

    let mut accepted = 0;
    let mut short = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(GalleyError::InsufficientInventory { .. }) => short += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(short, 15);
    assert_eq!(tk.stock(BUN), 0.0);
    assert_eq!(tk.stock(PATTY), 0.0);
    assert_eq!(tk.kitchen.pending().await, 10);
}

#[tokio::test]
async fn test_submitted_order_is_visible_in_ledger() {
    let tk = TestKitchen::new(test_config(), burger_menu(5.0, 5.0, one_chef_one_waiter()));
    let receipt = tk.kitchen.submit_order("Burger", 2).await.unwrap();

    let record = tk.kitchen.order(receipt.order_id).await.unwrap();

    assert_eq!(record.recipe, "Burger");
    assert_eq!(record.quantity, 2);
    assert_eq!(record.total_cost, 16.0);
    assert_eq!(
        record.status,
        OrderStatus::Queued {
            stage: Stage::Preparation
        }
    );
    assert!(record.finished_at.is_none());
}
