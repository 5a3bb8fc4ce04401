mod util;
use util::*;

use streampipe_group::{Coordinator, ShutdownCause, Supervisor};
use streampipe_types::{IdleMode, Rebalance};

// cargo test --test rebalance -- --nocapture
#[tokio::test]
async fn revoke_commits_before_ack() -> anyhow::Result<()> {
    init();
    let broker = register("rebalance-revoke");
    let supervisor = Supervisor::new(options(60_000, IdleMode::Activity));
    let switch = supervisor.switch();
    let coordinator = Coordinator::<MemorySession, _>::open(
        &config("rebalance-revoke"),
        broker.sink(),
        supervisor,
    )
    .await?;

    let (report, driven) = tokio::join!(coordinator.run(), async {
        broker.assign(&[0, 1]).await;
        broker.deliver(0, 0, "a");
        broker.deliver(0, 1, "b");
        broker.deliver(0, 2, "c");
        broker.deliver(1, 0, "d");
        wait_until(|| broker.marks(1) == [0]).await?;
        broker.revoke(&[0]).await;
        switch.trigger(ShutdownCause::Signal);
        anyhow::Ok(())
    });
    driven?;

    let commit = broker
        .position(|t| t == &Trace::Commit(tp(0), 2))
        .expect("partition 0 was never committed");
    let ack = broker
        .position(|t| t == &Trace::Ack(Rebalance::Revoke(vec![tp(0)])))
        .expect("revoke was never acknowledged");
    assert!(commit < ack);
    // partition 1 was not touched by the revoke
    let untouched = broker.position(|t| t == &Trace::Commit(tp(1), 0)).unwrap();
    assert!(ack < untouched);

    assert_eq!(broker.commits(0), [2]);
    assert_eq!(report.committed(&tp(0)), Some(2));
    assert_eq!(report.committed(&tp(1)), Some(0));
    Ok(())
}

#[tokio::test]
async fn records_after_revoke_are_dropped() -> anyhow::Result<()> {
    init();
    let broker = register("rebalance-stale");
    let supervisor = Supervisor::new(options(60_000, IdleMode::Activity));
    let switch = supervisor.switch();
    let coordinator = Coordinator::<MemorySession, _>::open(
        &config("rebalance-stale"),
        broker.sink(),
        supervisor,
    )
    .await?;

    let (report, driven) = tokio::join!(coordinator.run(), async {
        broker.assign(&[0, 1]).await;
        broker.deliver(0, 0, "kept");
        wait_until(|| broker.outputs().len() == 1).await?;
        broker.revoke(&[0]).await;
        // still in the client's prefetch queue when the partition moved away
        broker.deliver(0, 1, "stale");
        broker.deliver(1, 0, "fresh");
        wait_until(|| broker.outputs().len() == 2).await?;
        switch.trigger(ShutdownCause::Signal);
        anyhow::Ok(())
    });
    driven?;

    assert_eq!(broker.outputs(), ["kept", "fresh"]);
    assert_eq!(broker.marks(0), [0]);
    assert_eq!(report.committed(&tp(0)), Some(0));
    assert_eq!(report.committed(&tp(1)), Some(0));
    Ok(())
}

#[tokio::test]
async fn failed_flush_still_acks() -> anyhow::Result<()> {
    init();
    let broker = register("rebalance-flush-fail");
    let supervisor = Supervisor::new(options(60_000, IdleMode::Activity));
    let switch = supervisor.switch();
    let coordinator = Coordinator::<MemorySession, _>::open(
        &config("rebalance-flush-fail"),
        broker.sink(),
        supervisor,
    )
    .await?;

    let (report, driven) = tokio::join!(coordinator.run(), async {
        broker.assign(&[0]).await;
        broker.deliver(0, 0, "one");
        broker.deliver(0, 1, "two");
        wait_until(|| broker.marks(0) == [0, 1]).await?;
        broker.fail_commit(true);
        // returns only once acknowledged
        broker.revoke(&[0]).await;
        broker.fail_commit(false);

        broker.assign(&[0]).await;
        broker.deliver(0, 2, "three");
        wait_until(|| broker.outputs().len() == 3).await?;
        switch.trigger(ShutdownCause::Signal);
        anyhow::Ok(())
    });
    driven?;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(broker.commits(0), [2]);
    assert_eq!(report.committed(&tp(0)), Some(2));
    Ok(())
}

#[tokio::test]
async fn commits_per_partition_are_monotonic() -> anyhow::Result<()> {
    init();
    let broker = register("rebalance-monotonic");
    let supervisor = Supervisor::new(options(60_000, IdleMode::Activity));
    let switch = supervisor.switch();
    let coordinator = Coordinator::<MemorySession, _>::open(
        &config("rebalance-monotonic"),
        broker.sink(),
        supervisor,
    )
    .await?;

    let (report, driven) = tokio::join!(coordinator.run(), async {
        broker.assign(&[0, 1, 2]).await;
        let mut next = [0i64; 3];
        let mut written = 0;
        for round in 0..6 {
            for (partition, offset) in next.iter_mut().enumerate() {
                for _ in 0..=(round + partition) % 3 {
                    broker.deliver(partition as i32, *offset, &format!("{partition}:{offset}"));
                    *offset += 1;
                    written += 1;
                }
            }
            wait_until(|| broker.outputs().len() == written).await?;
            let moving = (round % 3) as i32;
            broker.revoke(&[moving]).await;
            broker.assign(&[moving]).await;
        }
        switch.trigger(ShutdownCause::Signal);
        anyhow::Ok(())
    });
    driven?;

    for partition in 0..3 {
        let commits = broker.commits(partition);
        assert!(!commits.is_empty());
        assert!(commits.windows(2).all(|w| w[0] < w[1]), "{commits:?}");
        assert_eq!(report.committed(&tp(partition)), commits.last().copied());
    }
    Ok(())
}

#[tokio::test]
async fn assignment_resets_idle_timer() -> anyhow::Result<()> {
    init();
    let broker = register("rebalance-idle");
    let supervisor = Supervisor::new(options(200, IdleMode::Activity));
    let coordinator = Coordinator::<MemorySession, _>::open(
        &config("rebalance-idle"),
        broker.sink(),
        supervisor,
    )
    .await?;

    let started = std::time::Instant::now();
    let (report, _) = tokio::join!(coordinator.run(), async {
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        broker.assign(&[0]).await;
    });

    assert_eq!(report.cause, ShutdownCause::IdleTimeout);
    assert!(started.elapsed() >= std::time::Duration::from_millis(300));
    Ok(())
}
