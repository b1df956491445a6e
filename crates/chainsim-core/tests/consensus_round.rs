use chainsim_core::{Coordinator, Participant, RoundState, SimConfig};

fn test_config() -> SimConfig {
    SimConfig {
        difficulty: "00".to_string(),
        base_batch: 64,
        batch_multiplier: 4,
        ..SimConfig::default()
    }
}

#[tokio::test]
async fn transfer_round_updates_balances_and_extends_every_chain() {
    let mut coordinator = Coordinator::new(test_config());
    let genesis_hashes: Vec<String> = Participant::ALL
        .iter()
        .map(|p| coordinator.state().chain(*p).get(0).unwrap().hash.clone())
        .collect();

    coordinator
        .submit_transfer(Participant::A, Participant::B, 30)
        .unwrap();
    coordinator.mine_round().await.unwrap();
    assert_eq!(coordinator.round(), RoundState::Committed);

    let balances = coordinator.state().balances();
    assert_eq!(balances.get(Participant::A), 70);
    assert_eq!(balances.get(Participant::B), 130);
    assert_eq!(balances.get(Participant::C), 100);

    for (p, genesis_hash) in Participant::ALL.into_iter().zip(genesis_hashes) {
        let chain = coordinator.state().chain(p);
        assert_eq!(chain.len(), 2);
        let block = chain.get(1).unwrap();
        assert_eq!(block.previous_hash, genesis_hash);
        assert_eq!(block.payload, "A -> B : 30");
        assert!(block.hash.starts_with("00"));
    }
    assert!(coordinator.state().pool().is_empty());
}

#[tokio::test]
async fn fresh_chains_verify_clean_and_verification_is_idempotent() {
    let mut coordinator = Coordinator::new(test_config());
    coordinator
        .submit_transfer(Participant::B, Participant::C, 5)
        .unwrap();
    coordinator.mine_round().await.unwrap();

    let first = coordinator.verify_all();
    for report in &first {
        assert_eq!(report, &vec![(0, true), (1, true)]);
    }
    let second = coordinator.verify_all();
    assert_eq!(first, second);
}

#[tokio::test]
async fn balances_are_conserved_across_rounds() {
    let mut coordinator = Coordinator::new(test_config());
    let total = coordinator.state().balances().total();

    coordinator
        .submit_transfer(Participant::A, Participant::B, 30)
        .unwrap();
    coordinator
        .submit_transfer(Participant::C, Participant::A, 12)
        .unwrap();
    coordinator.mine_round().await.unwrap();
    assert_eq!(coordinator.state().balances().total(), total);

    coordinator
        .submit_transfer(Participant::B, Participant::C, 99)
        .unwrap();
    coordinator.mine_round().await.unwrap();
    assert_eq!(coordinator.state().balances().total(), total);
}

#[tokio::test]
async fn overspending_batch_fails_atomically() {
    let mut coordinator = Coordinator::new(test_config());
    // each submit passes against committed balances, together they overspend
    coordinator
        .submit_transfer(Participant::A, Participant::B, 70)
        .unwrap();
    coordinator
        .submit_transfer(Participant::A, Participant::C, 70)
        .unwrap();

    let err = coordinator.mine_round().await.unwrap_err();
    assert_eq!(
        err,
        chainsim_core::SimError::InsufficientBalance(Participant::A)
    );
    assert_eq!(coordinator.round(), RoundState::Aborted);
    for p in Participant::ALL {
        assert_eq!(coordinator.state().balances().get(p), 100);
        assert_eq!(coordinator.state().chain(p).len(), 1);
    }
}

#[tokio::test]
async fn reconcile_heals_a_single_tampered_chain_from_the_majority() {
    let mut coordinator = Coordinator::new(test_config());
    coordinator
        .submit_transfer(Participant::A, Participant::B, 30)
        .unwrap();
    coordinator.mine_round().await.unwrap();

    coordinator.edit_payload(Participant::B, 1, "B -> B : 1000000");
    let reports = coordinator.verify_all();
    assert_eq!(reports[Participant::A.index()], vec![(0, true), (1, true)]);
    assert_eq!(reports[Participant::B.index()], vec![(0, true), (1, false)]);
    assert_eq!(reports[Participant::C.index()], vec![(0, true), (1, true)]);

    let a_block = coordinator.state().chain(Participant::A).get(1).unwrap().clone();
    let c_block = coordinator.state().chain(Participant::C).get(1).unwrap().clone();
    coordinator.reconcile();

    // B's tampered block was overwritten with the majority block
    let healed = coordinator.state().chain(Participant::B).get(1).unwrap();
    assert_eq!(healed.hash, a_block.hash);
    assert_eq!(healed.payload, a_block.payload);
    assert!(!healed.invalid);

    // the agreeing chains were left untouched
    assert_eq!(coordinator.state().chain(Participant::A).get(1).unwrap(), &a_block);
    assert_eq!(coordinator.state().chain(Participant::C).get(1).unwrap(), &c_block);

    // the healed state survives a full re-verification
    for report in coordinator.verify_all() {
        assert_eq!(report, vec![(0, true), (1, true)]);
    }
}

#[tokio::test]
async fn reconcile_relinks_successors_after_replacing_an_earlier_block() {
    let mut coordinator = Coordinator::new(test_config());
    coordinator
        .submit_transfer(Participant::A, Participant::B, 10)
        .unwrap();
    coordinator.mine_round().await.unwrap();
    coordinator
        .submit_transfer(Participant::B, Participant::C, 10)
        .unwrap();
    coordinator.mine_round().await.unwrap();

    // tamper in the middle of C's chain
    coordinator.edit_payload(Participant::C, 1, "C rewrites history");
    coordinator.verify_all();
    coordinator.reconcile();

    let chain = coordinator.state().chain(Participant::C);
    let majority_hash = coordinator
        .state()
        .chain(Participant::A)
        .get(1)
        .unwrap()
        .hash
        .clone();
    assert_eq!(chain.get(1).unwrap().hash, majority_hash);
    // the successor's parent pointer was repaired without rehashing
    assert_eq!(chain.get(2).unwrap().previous_hash, chain.get(1).unwrap().hash);
    for report in coordinator.verify_all() {
        assert_eq!(report, vec![(0, true), (1, true), (2, true)]);
    }
}
