use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, OnceLock},
};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

#[derive(Default)]
struct MetricsState {
    total: u64,
    errors: u64,
    per_endpoint: HashMap<String, u64>,
    per_endpoint_err: HashMap<String, u64>,
    // 模拟操作结果：(operation, outcome) → 次数
    sim_outcomes: HashMap<(&'static str, &'static str), u64>,
    quotes_issued: u64,
    quote_rate_fallback: u64,
    quotes_expired_rejected: u64,
    status_polls: u64,
    store_insert_fail: u64,
    // 链桥接调用时延（毫秒）：<50, <100, <250, <500, <1000, >=1000
    chain_ok: u64,
    chain_err: u64,
    chain_latency_sum_ms: u128,
    chain_hist_buckets: [u64; 6],
}

fn state() -> MutexGuard<'static, MetricsState> {
    let m = METRICS.get_or_init(|| Mutex::new(MetricsState::default()));
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

pub fn count_ok(endpoint: &str) {
    let mut s = state();
    s.total += 1;
    *s.per_endpoint.entry(endpoint.to_string()).or_insert(0) += 1;
}

pub fn count_err(endpoint: &str) {
    let mut s = state();
    s.total += 1;
    s.errors += 1;
    *s.per_endpoint.entry(endpoint.to_string()).or_insert(0) += 1;
    *s.per_endpoint_err.entry(endpoint.to_string()).or_insert(0) += 1;
}

/// 记录一次模拟操作的结果：ok / failed / cancelled
pub fn record_simulation(operation: &'static str, outcome: &'static str) {
    *state().sim_outcomes.entry((operation, outcome)).or_insert(0) += 1;
}

pub fn inc_quote_issued(fallback_rate: bool) {
    let mut s = state();
    s.quotes_issued += 1;
    if fallback_rate {
        s.quote_rate_fallback += 1;
    }
}

pub fn inc_quote_expired_rejected() {
    state().quotes_expired_rejected += 1;
}

pub fn inc_status_poll() {
    state().status_polls += 1;
}

pub fn inc_store_insert_fail() {
    state().store_insert_fail += 1;
}

pub fn observe_chain_latency_ms(latency_ms: u128, ok: bool) {
    let mut s = state();
    if ok {
        s.chain_ok += 1;
    } else {
        s.chain_err += 1;
    }
    s.chain_latency_sum_ms += latency_ms;
    let b = if latency_ms < 50 {
        0
    } else if latency_ms < 100 {
        1
    } else if latency_ms < 250 {
        2
    } else if latency_ms < 500 {
        3
    } else if latency_ms < 1000 {
        4
    } else {
        5
    };
    s.chain_hist_buckets[b] += 1;
}

fn push_counter(out: &mut String, name: &str, help: &str) {
    out.push_str(&format!("# HELP {} {}\n", name, help));
    out.push_str(&format!("# TYPE {} counter\n", name));
}

pub fn render_prometheus() -> String {
    let s = state();
    let mut out = String::new();

    push_counter(&mut out, "swapdesk_requests_total", "Total requests");
    out.push_str(&format!("swapdesk_requests_total {}\n", s.total));

    push_counter(&mut out, "swapdesk_errors_total", "Total error responses");
    out.push_str(&format!("swapdesk_errors_total {}\n", s.errors));

    push_counter(
        &mut out,
        "swapdesk_endpoint_requests_total",
        "Requests per endpoint",
    );
    let mut endpoints: Vec<_> = s.per_endpoint.iter().collect();
    endpoints.sort();
    for (k, v) in endpoints {
        out.push_str(&format!(
            "swapdesk_endpoint_requests_total{{endpoint=\"{}\"}} {}\n",
            k, v
        ));
    }

    push_counter(
        &mut out,
        "swapdesk_endpoint_errors_total",
        "Errors per endpoint",
    );
    let mut endpoint_errs: Vec<_> = s.per_endpoint_err.iter().collect();
    endpoint_errs.sort();
    for (k, v) in endpoint_errs {
        out.push_str(&format!(
            "swapdesk_endpoint_errors_total{{endpoint=\"{}\"}} {}\n",
            k, v
        ));
    }

    push_counter(
        &mut out,
        "swapdesk_simulation_total",
        "Simulated operations by outcome",
    );
    let mut outcomes: Vec<_> = s.sim_outcomes.iter().collect();
    outcomes.sort();
    for ((op, outcome), v) in outcomes {
        out.push_str(&format!(
            "swapdesk_simulation_total{{operation=\"{}\",outcome=\"{}\"}} {}\n",
            op, outcome, v
        ));
    }

    push_counter(&mut out, "swapdesk_quotes_issued_total", "Quotes issued");
    out.push_str(&format!("swapdesk_quotes_issued_total {}\n", s.quotes_issued));

    push_counter(
        &mut out,
        "swapdesk_quote_rate_fallback_total",
        "Quotes priced with a random fallback rate",
    );
    out.push_str(&format!(
        "swapdesk_quote_rate_fallback_total {}\n",
        s.quote_rate_fallback
    ));

    push_counter(
        &mut out,
        "swapdesk_quotes_expired_rejected_total",
        "Swap executions rejected for a stale quote",
    );
    out.push_str(&format!(
        "swapdesk_quotes_expired_rejected_total {}\n",
        s.quotes_expired_rejected
    ));

    push_counter(&mut out, "swapdesk_status_polls_total", "Transaction status polls");
    out.push_str(&format!("swapdesk_status_polls_total {}\n", s.status_polls));

    push_counter(
        &mut out,
        "swapdesk_store_insert_fail_total",
        "Failed transaction record inserts",
    );
    out.push_str(&format!(
        "swapdesk_store_insert_fail_total {}\n",
        s.store_insert_fail
    ));

    // 链桥接统计
    push_counter(&mut out, "swapdesk_chain_requests_total", "Chain bridge calls");
    out.push_str(&format!(
        "swapdesk_chain_requests_total{{result=\"ok\"}} {}\n",
        s.chain_ok
    ));
    out.push_str(&format!(
        "swapdesk_chain_requests_total{{result=\"err\"}} {}\n",
        s.chain_err
    ));

    push_counter(
        &mut out,
        "swapdesk_chain_latency_ms_sum",
        "Sum of chain bridge latency in ms",
    );
    out.push_str(&format!(
        "swapdesk_chain_latency_ms_sum {}\n",
        s.chain_latency_sum_ms
    ));

    out.push_str("# HELP swapdesk_chain_latency_ms_bucket Chain bridge latency histogram buckets\n");
    out.push_str("# TYPE swapdesk_chain_latency_ms_bucket histogram\n");
    let bounds = [50, 100, 250, 500, 1000];
    let mut cumulative = 0;
    for (i, bound) in bounds.iter().enumerate() {
        cumulative += s.chain_hist_buckets[i];
        out.push_str(&format!(
            "swapdesk_chain_latency_ms_bucket{{le=\"{}\"}} {}\n",
            bound, cumulative
        ));
    }
    // +Inf 桶
    out.push_str(&format!(
        "swapdesk_chain_latency_ms_bucket{{le=\"+Inf\"}} {}\n",
        s.chain_hist_buckets.iter().sum::<u64>()
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_counters() {
        count_ok("/api/test-metrics");
        count_err("/api/test-metrics");
        record_simulation("connect", "ok");
        inc_quote_issued(true);
        observe_chain_latency_ms(120, true);

        let text = render_prometheus();
        assert!(text.contains("swapdesk_endpoint_requests_total{endpoint=\"/api/test-metrics\"}"));
        assert!(text.contains("swapdesk_endpoint_errors_total{endpoint=\"/api/test-metrics\"}"));
        assert!(text.contains("swapdesk_simulation_total{operation=\"connect\",outcome=\"ok\"}"));
        assert!(text.contains("swapdesk_chain_latency_ms_bucket{le=\"+Inf\"}"));
    }
}
