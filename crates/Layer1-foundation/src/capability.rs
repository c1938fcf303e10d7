//! Capability / Event Matcher - 계층형 dotted-path 매칭
//!
//! `"a.b.c"`는 `"a.b"`의 하위 capability(또는 하위 이벤트)입니다.
//! 매칭은 `.` 단위 세그먼트 비교이며 부분 문자열 매칭은 하지 않습니다
//! (`"a.bc"`는 `"a.b"`의 하위가 아님).
//!
//! 이벤트 라우팅도 같은 규칙을 사용하므로 `*_event` 별칭을 함께 제공합니다.

/// 세그먼트 구분자
pub const SEPARATOR: char = '.';

fn segments(name: &str) -> impl Iterator<Item = &str> {
    name.split(SEPARATOR)
}

/// `candidate`가 `base`와 같거나 `base`의 하위 capability인지 확인
pub fn is_capability_or_sub_capability(base: &str, candidate: &str) -> bool {
    let mut candidate_segments = segments(candidate);

    for base_segment in segments(base) {
        match candidate_segments.next() {
            Some(segment) if segment == base_segment => continue,
            _ => return false,
        }
    }

    true
}

/// `candidate`가 `base`의 엄격한 하위 capability인지 확인 (자기 자신은 false)
pub fn is_sub_capability(base: &str, candidate: &str) -> bool {
    base != candidate && is_capability_or_sub_capability(base, candidate)
}

/// `name` 자신과 모든 상위 capability (짧은 것부터)
///
/// `"a.b.c"` → `["a", "a.b", "a.b.c"]`
pub fn capability_and_super_capabilities(name: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::with_capacity(name.len());

    for segment in segments(name) {
        if !current.is_empty() {
            current.push(SEPARATOR);
        }
        current.push_str(segment);
        result.push(current.clone());
    }

    result
}

/// `list` 중 `name`과 같거나 `name`의 상위인 항목들 (입력 순서 유지)
pub fn capabilities_or_super_capabilities_in_list<'a, I>(name: &str, list: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    list.into_iter()
        .filter(|registered| is_capability_or_sub_capability(registered, name))
        .cloned()
        .collect()
}

// ============================================================================
// 이벤트 별칭
// ============================================================================

/// `candidate`가 `base`와 같거나 `base`의 하위 이벤트인지 확인
pub fn is_event_or_sub_event(base: &str, candidate: &str) -> bool {
    is_capability_or_sub_capability(base, candidate)
}

/// `candidate`가 `base`의 엄격한 하위 이벤트인지 확인
pub fn is_sub_event(base: &str, candidate: &str) -> bool {
    is_sub_capability(base, candidate)
}

/// `list` 중 `name`과 같거나 `name`의 상위 이벤트인 항목들
pub fn events_or_super_events_in_list<'a, I>(name: &str, list: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    capabilities_or_super_capabilities_in_list(name, list)
}
