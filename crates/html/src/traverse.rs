use crate::types::{Element, Id};

/// Assigns ids in document order to elements that have none; returns the next free id.
/// Elements already carrying an id keep it.
pub fn assign_node_ids(root: &mut Element) -> u32 {
    fn walk(el: &mut Element, next: &mut u32) {
        if el.id == Id(0) {
            el.id = Id(*next);
            *next = next.wrapping_add(1);
        }
        for c in &mut el.children {
            walk(c, next);
        }
    }

    fn max_id(el: &Element) -> u32 {
        el.children.iter().map(max_id).fold(el.id.0, u32::max)
    }

    let mut next = max_id(root).wrapping_add(1);
    walk(root, &mut next);
    next
}

/// Clears every id so a later `assign_node_ids` starts fresh.
pub fn clear_node_ids(root: &mut Element) {
    root.id = Id(0);
    for c in &mut root.children {
        clear_node_ids(c);
    }
}

pub fn find_node_by_id(el: &Element, id: Id) -> Option<&Element> {
    if el.id == id {
        return Some(el);
    }
    el.children.iter().find_map(|c| find_node_by_id(c, id))
}

pub fn find_node_by_id_mut(el: &mut Element, id: Id) -> Option<&mut Element> {
    if el.id == id {
        return Some(el);
    }
    for c in &mut el.children {
        if let Some(found) = find_node_by_id_mut(c, id) {
            return Some(found);
        }
    }
    None
}

/// Ids of elements matching `pred`, in document order (pre-order).
pub fn collect_ids(root: &Element, pred: &dyn Fn(&Element) -> bool) -> Vec<Id> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(el) = stack.pop() {
        if pred(el) {
            out.push(el.id);
        }
        for c in el.children.iter().rev() {
            stack.push(c);
        }
    }
    out
}

pub fn is_non_rendering_element(el: &Element) -> bool {
    matches!(
        el.tag.as_str(),
        "head" | "style" | "script" | "title" | "meta" | "link"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn ids_follow_document_order() {
        let mut doc = parse("<div><pre>a</pre><p><pre>b</pre></p></div><pre>c</pre>");
        assign_node_ids(doc.root_mut());
        let ids = collect_ids(doc.root(), &|el| el.tag == "pre");
        let texts: Vec<_> = ids
            .iter()
            .map(|id| find_node_by_id(doc.root(), *id).map(|el| el.text.clone()))
            .collect();
        assert_eq!(
            texts,
            vec![Some("a".into()), Some("b".into()), Some("c".into())]
        );
    }

    #[test]
    fn inserted_elements_get_fresh_ids_only_when_reassigned() {
        let mut doc = parse("<p>x</p>");
        let next = assign_node_ids(doc.root_mut());
        doc.root_mut().children.push(Element::new("span"));
        assert_eq!(doc.root().children[1].id, Id(0));
        assert_eq!(assign_node_ids(doc.root_mut()), next + 1);
    }
}
