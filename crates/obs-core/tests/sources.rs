mod common;

use chrono::NaiveDate;
use obs_core::sources::elkhorn_gis::{self, ElkhornGisQuery};
use obs_core::sources::lobo::{self, LoboQuery};
use obs_core::sources::mlml::{self, MlmlDataset, MlmlQuery};
use obs_core::sources::nerr::{self, NerrQuery};
use obs_core::sources::ocean_color::{self, OceanColorQuery};
use obs_core::{FileFetcher, SourceError};
use obs_parser::{ParseOptions, Provider};

use common::{endpoints, fixture, fixture_path, StubFetcher};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn mlml_fetches_each_year_and_trims_to_the_range() {
    let fetcher = StubFetcher::new().serve("MLML_SEAWATER_2019.csv", fixture("mlml_seawater.csv"));
    let query = MlmlQuery {
        dataset: MlmlDataset::Seawater,
        begin: date(2019, 1, 1),
        end: date(2019, 1, 1),
    };
    let table = mlml::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default())
        .expect("MLML fetch failed");
    assert_eq!(table.provider, Provider::Mlml);
    assert_eq!(table.height(), 3);
    assert_eq!(table.skipped_count(), 1);
    assert_eq!(
        fetcher.requested(),
        ["https://pubdata.mlml.calstate.edu/seawater/2019/MLML_SEAWATER_2019.csv"]
    );

    let later = MlmlQuery {
        begin: date(2019, 1, 2),
        end: date(2019, 1, 5),
        ..query
    };
    let table = mlml::fetch(&fetcher, &endpoints(), &later, &ParseOptions::default())
        .expect("MLML fetch failed");
    assert_eq!(table.height(), 0);
    // Rejected lines are reported for the whole yearly file.
    assert_eq!(table.skipped_count(), 1);
}

#[test]
fn mlml_missing_year_is_unavailable() {
    let fetcher = StubFetcher::new().serve("MLML_SEAWATER_2019.csv", fixture("mlml_seawater.csv"));
    let query = MlmlQuery {
        dataset: MlmlDataset::Seawater,
        begin: date(2018, 12, 30),
        end: date(2019, 1, 1),
    };
    let err = mlml::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default()).unwrap_err();
    match err {
        SourceError::SourceUnavailable { url, .. } => assert!(url.ends_with("MLML_SEAWATER_2018.csv")),
        other => panic!("expected SourceUnavailable, got {other:?}"),
    }
}

#[test]
fn lobo_request_lists_node_dates_and_variables() {
    let query = LoboQuery {
        node: "L01".to_string(),
        begin: date(2020, 3, 1),
        end: date(2020, 3, 2),
        variables: vec!["nitrate".to_string(), "temperature".to_string()],
    };
    let url = lobo::request_url(&endpoints(), &query).unwrap();
    assert!(url.contains("node=L01"));
    assert!(url.contains("min_date=20200301"));
    assert!(url.contains("max_date=20200302"));
    assert!(url.contains("y=nitrate%2Ctemperature"));
    assert!(url.contains("data_format=text"));

    let fetcher = StubFetcher::new().serve("node=L01", fixture("lobo_l01.txt"));
    let table = lobo::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default())
        .expect("LOBO fetch failed");
    assert_eq!(table.height(), 3);
}

#[test]
fn nerr_fetch_parses_swmp_export() {
    let fetcher = StubFetcher::new().serve("station_code=elkapwq", fixture("nerr_elkapwq.csv"));
    let query = NerrQuery {
        station: "ELKAPWQ".to_string(),
        begin: date(2021, 1, 15),
        end: date(2021, 1, 15),
    };
    let table = nerr::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default())
        .expect("NERR fetch failed");
    assert_eq!(table.provider, Provider::Nerr);
    assert_eq!(table.height(), 3);
}

#[test]
fn unknown_lobo_node_is_unavailable() {
    let fetcher = StubFetcher::new().serve("node=L99", "No data available for node L99\r\n");
    let query = LoboQuery {
        node: "L99".to_string(),
        begin: date(2020, 3, 1),
        end: date(2020, 3, 2),
        variables: vec!["nitrate".to_string()],
    };
    let err = lobo::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default()).unwrap_err();
    match err {
        SourceError::SourceUnavailable {
            provider,
            url,
            reason,
        } => {
            assert_eq!(provider, Provider::Lobo);
            assert!(url.contains("node=L99"));
            assert_eq!(reason, "No data available for node L99");
        }
        other => panic!("expected SourceUnavailable, got {other:?}"),
    }
}

#[test]
fn unknown_nerr_station_is_unavailable() {
    let fetcher = StubFetcher::new().serve(
        "station_code=xxxxxwq",
        "<html><body><p>Invalid station code: xxxxxwq</p></body></html>",
    );
    let query = NerrQuery {
        station: "xxxxxwq".to_string(),
        begin: date(2021, 1, 15),
        end: date(2021, 1, 15),
    };
    let err = nerr::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default()).unwrap_err();
    match err {
        SourceError::SourceUnavailable {
            provider, reason, ..
        } => {
            assert_eq!(provider, Provider::Nerr);
            assert!(reason.contains("Invalid station code"));
        }
        other => panic!("expected SourceUnavailable, got {other:?}"),
    }
}

#[test]
fn invalid_queries_never_reach_the_fetcher() {
    let fetcher = StubFetcher::new();
    let query = NerrQuery {
        station: String::new(),
        begin: date(2021, 1, 15),
        end: date(2021, 1, 15),
    };
    assert!(matches!(
        nerr::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default()),
        Err(SourceError::InvalidQuery { .. })
    ));

    let query = ElkhornGisQuery {
        layer: "../secrets".to_string(),
    };
    assert!(matches!(
        elkhorn_gis::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default()),
        Err(SourceError::InvalidQuery { parameter: "layer", .. })
    ));
    assert!(fetcher.requested().is_empty());
}

#[test]
fn elkhorn_fetch_parses_kml_layer() {
    let fetcher = StubFetcher::new().serve("water_quality.kml", fixture("elkhorn_sites.kml"));
    let query = ElkhornGisQuery {
        layer: "water_quality".to_string(),
    };
    let table = elkhorn_gis::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default())
        .expect("Elkhorn fetch failed");
    assert_eq!(table.height(), 2);
    assert_eq!(
        fetcher.requested(),
        ["https://www.elkhornslough.org/gis/water_quality.kml"]
    );
}

#[test]
fn parse_errors_propagate_unchanged() {
    let fetcher = StubFetcher::new().serve("water_quality.kml", "<html>moved</html>");
    let query = ElkhornGisQuery {
        layer: "water_quality".to_string(),
    };
    let err = elkhorn_gis::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default())
        .unwrap_err();
    assert!(matches!(err, SourceError::Parse(_)));
}

#[test]
fn ocean_color_stacks_days_and_skips_missing_granules() {
    let fetcher = StubFetcher::new().serve("A2019182.", fixture("modis_chl.dap.txt"));
    let mut query = OceanColorQuery::new((2019, 2019), (36.8, 36.9), (-122.08, -122.0));
    query.start_day = Some(182);
    query.end_day = Some(183);

    let table = ocean_color::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default())
        .expect("ocean color fetch failed");
    assert_eq!(table.column_names(), ["time", "latitude", "longitude", "chl_ocx"]);
    assert_eq!(table.height(), 2);

    let requested = fetcher.requested();
    assert_eq!(requested.len(), 2);
    assert!(requested[0].contains("/2019/182/A2019182.L3m_DAY_CHL_chl_ocx_4km.nc.ascii?"));
    assert!(requested[1].contains("/2019/183/A2019183."));
}

#[test]
fn ocean_color_skips_days_answered_with_a_server_error() {
    let fetcher = StubFetcher::new()
        .serve("A2019182.", fixture("modis_chl.dap.txt"))
        .serve(
            "A2019183.",
            "Error {\n    code = 404;\n    message = \"granule not found\";\n};\n",
        );
    let mut query = OceanColorQuery::new((2019, 2019), (36.8, 36.9), (-122.08, -122.0));
    query.start_day = Some(182);
    query.end_day = Some(183);

    let table = ocean_color::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default())
        .expect("ocean color fetch failed");
    assert_eq!(table.height(), 2);
    assert_eq!(fetcher.requested().len(), 2);

    query.start_day = Some(183);
    let err = ocean_color::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default())
        .unwrap_err();
    match err {
        SourceError::SourceUnavailable { url, reason, .. } => {
            assert!(url.contains("A2019183."));
            assert!(reason.contains("chl_ocx"));
        }
        other => panic!("expected SourceUnavailable, got {other:?}"),
    }
}

#[test]
fn ocean_color_fails_when_no_day_is_available() {
    let fetcher = StubFetcher::new();
    let mut query = OceanColorQuery::new((2019, 2019), (36.8, 36.9), (-122.08, -122.0));
    query.start_day = Some(1);
    query.end_day = Some(2);
    let err = ocean_color::fetch(&fetcher, &endpoints(), &query, &ParseOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        SourceError::SourceUnavailable {
            provider: Provider::OceanColor,
            ..
        }
    ));
}

#[test]
fn file_fetcher_reads_paths_and_file_urls() {
    let path = fixture_path("noaa_epoch.csv");
    let plain = obs_core::Fetcher::get(&FileFetcher, path.to_str().unwrap()).unwrap();
    let url = format!("file://{}", path.display());
    let via_url = obs_core::Fetcher::get(&FileFetcher, &url).unwrap();
    assert_eq!(plain, via_url);
    assert!(obs_core::Fetcher::get(&FileFetcher, "/no/such/file.csv").is_err());
}
