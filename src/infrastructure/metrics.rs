// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 安装 Prometheus 导出器并登记指标说明
///
/// 地址无法解析或端口被占用时只记录警告，服务照常启动
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(
                "Invalid metrics listen address {}: {}",
                settings.listen_addr, e
            );
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!("jobs_submitted_total", "Jobs accepted and dispatched");
    describe_counter!(
        "items_completed_total",
        "Items that reached a terminal state, labelled by outcome"
    );
    describe_counter!("check_retries_total", "Address checks retried after a transient failure");
    describe_counter!(
        "tasks_redelivered_total",
        "Tasks made visible again after their visibility timeout"
    );
    describe_gauge!("jobs_stalled", "Running jobs without progress past the stall timeout");
    describe_histogram!(
        "item_check_duration_seconds",
        Unit::Seconds,
        "Duration of a single address check attempt"
    );
}
