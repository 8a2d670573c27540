//! 集成测试共用的内存环境

#![allow(dead_code)]

use geotrack::AppState;
use geotrack::config::Config;
use geotrack::location::{Coordinates, DeviceMetadata, Ingested};
use geotrack::membership::MemberStatus;
use geotrack::store::Backends;
use geotrack::store::memory::MemoryBackends;
use geotrack::utils::geo::EARTH_RADIUS_METERS;

pub const JWT_SECRET: &str = "test-secret";

/// 北京天安门附近
pub const BASE: (f64, f64) = (39.9042, 116.4074);

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        redis_url: "redis://unused".into(),
        jwt_secret: JWT_SECRET.into(),
        server_host: "127.0.0.1".into(),
        server_port: 0,
        api_base_uri: "/api".into(),
        rate_limit_window_secs: 60,
        rate_limit_requests: 100,
        influx: None,
        background_timeout_ms: 500,
        background_max_retries: 1,
        background_backoff_ms: 10,
    }
}

pub struct Harness {
    pub mem: MemoryBackends,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        let mem = MemoryBackends::new();
        let backends = mem.backends();
        Self::with_backends(mem, backends)
    }

    /// 使用替换过部分组件的 backends，mem 仍可用于检查结果
    pub fn with_backends(mem: MemoryBackends, backends: Backends) -> Self {
        let state = AppState::new(test_config(), backends);
        Self { mem, state }
    }

    /// 新建群组并加入活跃成员
    pub fn group(&self, group_id: &str, name: &str, sharing: bool, members: &[&str]) {
        self.mem.directory.add_group(group_id, name, sharing);
        for member in members {
            self.mem
                .directory
                .set_member(group_id, member, MemberStatus::Active);
        }
    }

    /// 上报位置并等待后台任务完成
    pub async fn report(&self, user_id: &str, (lat, lon): (f64, f64)) -> Ingested {
        let ingested = self
            .state
            .locations
            .ingest(user_id, Coordinates::new(lat, lon), DeviceMetadata::default())
            .await
            .unwrap();
        let sample = ingested.sample.clone();
        ingested.background.join().await;
        Ingested {
            sample,
            background: Default::default(),
        }
    }
}

/// 沿经线向北移动指定米数
pub fn north_of((lat, lon): (f64, f64), meters: f64) -> (f64, f64) {
    (lat + (meters / EARTH_RADIUS_METERS).to_degrees(), lon)
}
