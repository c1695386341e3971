use btrank::{rank, ComparisonRecord, ComparisonStore, Outcome, PairWeighting, RankConfig};

fn main() {
    println!("btrank: Bradley-Terry ranking from pairwise judgments");
    println!("=====================================================\n");

    basic_example();

    weighting_example();

    #[cfg(feature = "serde")]
    jsonl_example();
}

fn basic_example() {
    println!("Basic Example:");
    println!("-------------");

    let mut store = ComparisonStore::new();

    let judgments = vec![
        ("A", "B", Outcome::AWins),
        ("B", "C", Outcome::AWins),
        ("A", "C", Outcome::AWins),
        ("C", "D", Outcome::AWins),
        ("B", "D", Outcome::Draw),
        ("A", "D", Outcome::None),
    ];

    for (a, b, outcome) in judgments {
        let record = ComparisonRecord::new(a.to_string(), b.to_string(), outcome);
        println!("  recorded {}", record);
        store.add(record).unwrap();
    }

    let report = store.rank(&RankConfig::default()).unwrap();

    println!("\nBaseline win-rate ranking:");
    for (item, frequency) in &report.baseline {
        println!("  {}: {:.4}", item, frequency);
    }

    let mut strengths: Vec<_> = report.strengths.iter().collect();
    strengths.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));

    println!("\nBradley-Terry strengths (sum to 100):");
    for (item, score) in strengths {
        println!("  {}: {:.2}", item, score);
    }

    println!(
        "\nConverged: {} after {} iterations\n",
        report.converged, report.iterations_used
    );
}

fn weighting_example() {
    println!("Pair Weighting Example:");
    println!("----------------------");

    // The same pair judged three times: existence weighting flattens the
    // repeats, count weighting keeps them.
    let records = vec![
        ComparisonRecord::new("A".to_string(), "B".to_string(), Outcome::AWins),
        ComparisonRecord::new("A".to_string(), "B".to_string(), Outcome::AWins),
        ComparisonRecord::new("A".to_string(), "B".to_string(), Outcome::BWins),
        ComparisonRecord::new("B".to_string(), "C".to_string(), Outcome::AWins),
    ];

    for weighting in [PairWeighting::Existence, PairWeighting::Count] {
        let config = RankConfig {
            weighting,
            ..RankConfig::default()
        };
        let report = rank(&records, &config).unwrap();
        println!(
            "  {:?}: A = {:.2}, B = {:.2}, C = {:.2}",
            weighting, report.strengths["A"], report.strengths["B"], report.strengths["C"]
        );
    }
    println!();
}

#[cfg(feature = "serde")]
fn jsonl_example() {
    use btrank::PromptQueue;

    println!("JSONL Session Example:");
    println!("---------------------");

    let input = concat!(
        r#"{"prompt":"Pick the clearer summary","responseA":"...","responseB":"...","idA":"model-x","idB":"model-y"}"#,
        "\n",
        r#"{"prompt":"Pick the clearer summary","responseA":"...","responseB":"...","idA":"model-y","idB":"model-z"}"#,
        "\n",
        r#"{"prompt":"Pick the clearer summary","responseA":"...","responseB":"...","idA":"model-x","idB":"model-z"}"#,
        "\n",
    );

    let mut queue = PromptQueue::from_jsonl(input).unwrap();
    let mut store = ComparisonStore::new();

    // Stand-in for the human judge: always prefer A.
    while let Some(pending) = queue.advance() {
        let record = pending.judged(Outcome::AWins);
        store.add(record).unwrap();
    }
    println!("  judged {} prompts, queue exhausted: {}", store.len(), queue.is_exhausted());

    let report = store.rank(&RankConfig::default()).unwrap();
    println!("\nExported report:\n{}", report.to_json().unwrap());
}
