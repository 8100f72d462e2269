//! End-to-end session flow against the in-memory store.
//!
//! Walks a synthetic participant through the full page sequence the
//! deployed routes drive: registration, practice, every main trial with
//! settled payouts, the strategy prompt, the numeracy survey, and the
//! final page. Also covers the guard rails: repeat registration, the
//! paid-trial resume rule, and the pay-gated conditional write.

use rand::SeedableRng;
use rand::rngs::StdRng;

use experiment_flow::config::ExperimentConfig;
use experiment_flow::participant::ParticipantRecord;
use experiment_flow::payout::round_cent;
use experiment_flow::response::TrialKey;
use experiment_flow::service::{ExperimentService, Registration, TrialPage};
use experiment_flow::store::{ExperimentStore, MemoryStore, WriteOutcome};
use experiment_flow::survey::{NUMERACY_ITEMS, SurveyStatus, item_maximum};

const WORKER: &str = "w-int-1";
const CONDITION: &str = "HOPs";

fn test_service(max_trials: usize) -> ExperimentService<MemoryStore> {
    let config = ExperimentConfig {
        max_trials,
        trial_set_index: 2,
        ..Default::default()
    };
    ExperimentService::new(config, MemoryStore::new()).unwrap()
}

async fn register(service: &ExperimentService<MemoryStore>, rng: &mut StdRng) -> ParticipantRecord {
    match service
        .register(WORKER, "a-int-1", CONDITION, rng)
        .await
        .unwrap()
    {
        Registration::Accepted { record, .. } => record,
        Registration::Repeat { .. } => panic!("fresh worker should register"),
    }
}

#[tokio::test]
async fn full_session_reaches_the_final_summary() {
    let service = test_service(4);
    let mut rng = StdRng::seed_from_u64(11);

    let record = register(&service, &mut rng).await;
    assert_eq!(record.trial_set, 2);
    assert!(!record.bonus_settled());

    let practice = service.practice_page(WORKER, CONDITION);
    assert_eq!(practice.stimulus_path, "img/HOPs-5_sd_0.228_odds.gif");
    assert_eq!(
        practice.next_url,
        "/3_main_experiment_interface?workerId=w-int-1&cond=HOPs&trial=1"
    );

    // Row 2 of the order-4 square is [2, 3, 1, 0].
    let expected_conditions = [2usize, 3, 1, 0];
    let mut expected_total = 0.0;
    for trial in 1..=4 {
        let TrialPage::Present(ctx) = service
            .trial_page(WORKER, CONDITION, trial)
            .await
            .unwrap()
        else {
            panic!("unplayed trial {trial} should render");
        };
        assert_eq!(ctx.condition_index, expected_conditions[trial - 1]);

        let settled = service
            .settle_trial(WORKER, CONDITION, trial, 50.0, 0.25, &mut rng)
            .await
            .unwrap();
        assert!(settled.stored.written());
        assert!(settled.response.pay >= 0.0);
        expected_total += settled.response.pay;
    }

    service
        .submit_strategy(WORKER, CONDITION, "watched how far the draws spread")
        .await
        .unwrap();
    assert!(
        service
            .strategy_status(WORKER)
            .await
            .unwrap()
            .is_complete()
    );

    for item in 1..=NUMERACY_ITEMS {
        let value = (item_maximum(item).unwrap() / 4.0).round();
        service
            .submit_numeracy_item(WORKER, item, value)
            .await
            .unwrap();
    }
    assert!(
        service
            .numeracy_status(WORKER)
            .await
            .unwrap()
            .is_complete()
    );

    let summary = service.final_summary(WORKER).await.unwrap();
    assert_eq!(summary.token, record.token);
    assert_eq!(summary.total_bonus, round_cent(expected_total));
}

#[tokio::test]
async fn repeat_registration_routes_to_the_return_page() {
    let service = test_service(4);
    let mut rng = StdRng::seed_from_u64(12);

    register(&service, &mut rng).await;
    match service
        .register(WORKER, "a-second", CONDITION, &mut rng)
        .await
        .unwrap()
    {
        Registration::Repeat { redirect_url } => {
            assert_eq!(redirect_url, "/0_return?workerId=w-int-1&cond=HOPs");
        }
        Registration::Accepted { .. } => panic!("repeat worker should be rejected"),
    }
}

#[tokio::test]
async fn refreshing_a_paid_trial_skips_forward() {
    let service = test_service(4);
    let mut rng = StdRng::seed_from_u64(13);

    register(&service, &mut rng).await;
    service
        .settle_trial(WORKER, CONDITION, 3, 40.0, 0.5, &mut rng)
        .await
        .unwrap();

    let TrialPage::Redirect { next_url } = service
        .trial_page(WORKER, CONDITION, 3)
        .await
        .unwrap()
    else {
        panic!("paid trial should redirect on refresh");
    };
    assert_eq!(
        next_url,
        "/3_main_experiment_interface?workerId=w-int-1&cond=HOPs&trial=4"
    );

    // The trial after it is untouched and still renders.
    assert!(matches!(
        service.trial_page(WORKER, CONDITION, 4).await.unwrap(),
        TrialPage::Present(_)
    ));
}

#[tokio::test]
async fn the_pay_gate_survives_a_duplicate_submission() {
    let service = test_service(4);
    let mut rng = StdRng::seed_from_u64(14);

    register(&service, &mut rng).await;
    let first = service
        .settle_trial(WORKER, CONDITION, 1, 60.0, 0.3, &mut rng)
        .await
        .unwrap();
    assert!(first.stored.written());

    // A duplicate settle (double-click, replayed request) is rejected
    // and the stored payout is unchanged.
    let duplicate = service
        .settle_trial(WORKER, CONDITION, 1, 90.0, 1.0, &mut rng)
        .await
        .unwrap();
    assert_eq!(duplicate.stored, WriteOutcome::Rejected);

    let summary = service.final_summary(WORKER).await.unwrap();
    assert_eq!(summary.total_bonus, first.response.pay);
}

#[tokio::test]
async fn survey_gates_report_what_is_missing() {
    let service = test_service(4);

    assert_eq!(
        service.strategy_status(WORKER).await.unwrap(),
        SurveyStatus::NoEntry
    );

    service
        .submit_numeracy_item(WORKER, 1, 10.0)
        .await
        .unwrap();
    assert_eq!(
        service.strategy_status(WORKER).await.unwrap(),
        SurveyStatus::MissingStrategy
    );
    assert_eq!(
        service.numeracy_status(WORKER).await.unwrap(),
        SurveyStatus::MissingItem(2)
    );
}

#[tokio::test]
async fn practice_responses_live_beside_numbered_trials() {
    let store = MemoryStore::new();

    // Store a practice response directly through the store seam, the way
    // the practice page's client does.
    let practice_stim = experiment_flow::stimulus::StimulusCatalog::standard().practice();
    let resp = experiment_flow::response::TrialResponse::new(
        WORKER,
        CONDITION,
        TrialKey::Practice,
        None,
        &practice_stim,
    );
    store
        .put_response_if_unpaid(WORKER, &TrialKey::Practice, &resp, false)
        .await
        .unwrap();

    let all = store.fetch_responses(WORKER).await.unwrap();
    assert!(all.contains_key("practice"));
}
